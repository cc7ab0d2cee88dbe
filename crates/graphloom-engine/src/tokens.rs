//! Heuristic token estimation and budget-driven subgraph truncation.
//!
//! CJK code points count as one token, everything else as 0.75; the
//! truncation pass keeps a 10% slack under the budget to absorb drift.

use std::collections::{HashMap, HashSet};

use graphloom_store::{Edge, Node};

/// Fixed overhead for the JSON envelope around the subgraph.
const BASE_OVERHEAD: usize = 200;
/// Per-node structural overhead.
const NODE_OVERHEAD: usize = 15;
/// Per-edge estimate.
const EDGE_TOKENS: usize = 10;

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

fn text_tokens(text: &str) -> usize {
    let (cjk, other) = text
        .chars()
        .fold((0usize, 0usize), |(cjk, other), c| {
            if is_cjk(c) {
                (cjk + 1, other)
            } else {
                (cjk, other + 1)
            }
        });
    cjk + (other * 3) / 4
}

fn node_tokens(node: &Node) -> usize {
    text_tokens(&node.desc) + node.id.len() / 3 + node.name.len() / 3 + NODE_OVERHEAD
}

/// Estimate the token cost of a subgraph handed to the model.
pub fn estimate_tokens(nodes: &[Node], edges: &[Edge]) -> usize {
    BASE_OVERHEAD + nodes.iter().map(node_tokens).sum::<usize>() + EDGE_TOKENS * edges.len()
}

/// Greedily keep the top-weighted nodes within 90% of `max_tokens`, then
/// drop edges with a dropped endpoint. No-op when already within budget.
pub fn truncate_to_budget(
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    weights: &HashMap<String, f64>,
    max_tokens: usize,
) -> (Vec<Node>, Vec<Edge>) {
    if estimate_tokens(&nodes, &edges) <= max_tokens {
        return (nodes, edges);
    }

    let budget = (max_tokens * 9) / 10;
    let mut ranked = nodes;
    ranked.sort_by(|a, b| {
        let wa = weights.get(&a.id).copied().unwrap_or(0.0);
        let wb = weights.get(&b.id).copied().unwrap_or(0.0);
        wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept = Vec::new();
    let mut running = BASE_OVERHEAD;
    for node in ranked {
        let cost = node_tokens(&node);
        if running + cost > budget {
            break;
        }
        running += cost;
        kept.push(node);
    }

    let kept_ids: HashSet<&str> = kept.iter().map(|n| n.id.as_str()).collect();
    let kept_edges: Vec<Edge> = edges
        .into_iter()
        .filter(|e| kept_ids.contains(e.source.as_str()) && kept_ids.contains(e.target.as_str()))
        .collect();

    (kept, kept_edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, desc: &str) -> Node {
        Node {
            id: id.into(),
            index: "t".into(),
            name: id.to_uppercase(),
            node_type: "Concept".into(),
            desc: desc.into(),
        }
    }

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
    fn test_estimate_counts_cjk_heavier() {
        let ascii = node("a", "abcdefgh");
        let cjk = node("a", "知识图谱检索引擎");
        assert!(
            estimate_tokens(&[cjk], &[]) > estimate_tokens(&[ascii], &[]),
            "8 CJK chars must estimate above 8 ASCII chars"
        );
    }

    #[test]
    fn test_estimate_includes_edges() {
        let nodes = vec![node("a", "x"), node("b", "y")];
        let bare = estimate_tokens(&nodes, &[]);
        let with_edge = estimate_tokens(&nodes, &[edge("a", "b")]);
        assert_eq!(with_edge, bare + EDGE_TOKENS);
    }

    #[test]
    fn test_within_budget_untouched() {
        let nodes = vec![node("a", "short")];
        let edges = vec![];
        let (kept, _) = truncate_to_budget(nodes.clone(), edges, &HashMap::new(), 10_000);
        assert_eq!(kept.len(), nodes.len());
    }

    #[test]
    fn test_truncation_keeps_top_weighted_within_slack() {
        let long_desc = "x".repeat(400);
        let nodes: Vec<Node> = (0..10)
            .map(|i| node(&format!("n{}", i), &long_desc))
            .collect();
        let mut weights = HashMap::new();
        for (i, n) in nodes.iter().enumerate() {
            weights.insert(n.id.clone(), 1.0 - i as f64 * 0.05);
        }
        let edges = vec![edge("n0", "n9"), edge("n0", "n1")];

        let max_tokens = estimate_tokens(&nodes, &edges) / 2;
        let (kept, kept_edges) = truncate_to_budget(nodes, edges, &weights, max_tokens);

        assert!(estimate_tokens(&kept, &kept_edges) <= (max_tokens * 9) / 10);
        // Highest-weighted node survives
        assert!(kept.iter().any(|n| n.id == "n0"));
        // Every surviving edge has both endpoints kept
        for e in &kept_edges {
            assert!(kept.iter().any(|n| n.id == e.source));
            assert!(kept.iter().any(|n| n.id == e.target));
        }
        // n9 was the lowest-weighted and the budget is half: it must be gone
        assert!(!kept.iter().any(|n| n.id == "n9"));
    }
}
