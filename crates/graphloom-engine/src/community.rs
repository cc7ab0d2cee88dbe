//! Fast label propagation over an undirected view of the graph.
//!
//! Deterministic for a fixed input: neighbour iteration uses ordered
//! adjacency and frequency ties break on the smallest label string.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use graphloom_store::Edge;

/// Iteration cap multiplier, in units of node count.
const MAX_ROUNDS_PER_NODE: usize = 50;

/// Propagate labels over the undirected edge view.
///
/// Returns `node id → community label` for every node with degree ≥ 1.
/// Isolated nodes never appear in the edge list and are left to the caller.
pub fn detect_communities(edges: &[Edge]) -> HashMap<String, String> {
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in edges {
        if edge.source == edge.target {
            continue;
        }
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .insert(edge.target.as_str());
        adjacency
            .entry(edge.target.as_str())
            .or_default()
            .insert(edge.source.as_str());
    }

    let mut labels: HashMap<String, String> = adjacency
        .keys()
        .map(|&id| (id.to_string(), id.to_string()))
        .collect();

    let mut queue: VecDeque<&str> = adjacency.keys().copied().collect();
    let mut queued: HashSet<&str> = queue.iter().copied().collect();
    let cap = adjacency.len().saturating_mul(MAX_ROUNDS_PER_NODE);
    let mut iterations = 0usize;

    while let Some(node) = queue.pop_front() {
        queued.remove(node);
        iterations += 1;
        if iterations > cap {
            break;
        }

        let neighbours = &adjacency[node];

        // Most frequent neighbour label; ties break on the smallest string.
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for &n in neighbours {
            *counts.entry(labels[n].as_str()).or_insert(0) += 1;
        }
        let best = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(&label, _)| label.to_string());

        let best = match best {
            Some(b) => b,
            None => continue,
        };

        if labels[node] != best {
            labels.insert(node.to_string(), best.clone());
            for &n in neighbours {
                if labels[n] != best && !queued.contains(n) {
                    queue.push_back(n);
                    queued.insert(n);
                }
            }
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            id: format!("{}-{}", source, target),
            index: "t".into(),
            source: source.into(),
            target: target.into(),
            relationship: "linked".into(),
        }
    }

    #[test]
    fn test_connected_component_converges_to_one_label() {
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        let labels = detect_communities(&edges);
        assert_eq!(labels.len(), 3);
        let label = &labels["a"];
        assert!(labels.values().all(|l| l == label));
    }

    #[test]
    fn test_two_components_get_distinct_labels() {
        let edges = vec![
            edge("a", "b"),
            edge("b", "c"),
            edge("c", "a"),
            edge("x", "y"),
            edge("y", "z"),
            edge("z", "x"),
        ];
        let labels = detect_communities(&edges);
        assert_eq!(labels["a"], labels["b"]);
        assert_eq!(labels["x"], labels["z"]);
        assert_ne!(labels["a"], labels["x"]);
    }

    #[test]
    fn test_self_loops_ignored() {
        let edges = vec![edge("a", "a"), edge("a", "b")];
        let labels = detect_communities(&edges);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_isolated_nodes_absent() {
        let edges = vec![edge("a", "b")];
        let labels = detect_communities(&edges);
        assert!(!labels.contains_key("lonely"));
    }

    #[test]
    fn test_deterministic_output() {
        let edges = vec![
            edge("n1", "n2"),
            edge("n2", "n3"),
            edge("n3", "n4"),
            edge("n4", "n1"),
            edge("n5", "n6"),
        ];
        let first = detect_communities(&edges);
        let second = detect_communities(&edges);
        assert_eq!(first, second);
    }
}
