//! End-to-end engine tests over a real SQLite repository, a deterministic
//! in-memory vector store, and a scripted semantic client.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_stream::StreamExt;

use graphloom_core::config::{ChunkerConfig, GraphSearchConfig};
use graphloom_core::{Error, Result};
use graphloom_engine::GraphEngine;
use graphloom_semantic::{
    AnswerStream, ExtractedEdge, ExtractedNode, GraphPayload, RelationJudgement, RelationSource,
    SemanticClient,
};
use graphloom_store::{Edge, Node, Repository, SqliteRepository};
use graphloom_vector::{VectorHit, VectorMemory};

// -------------------------------------------------------------------
// Mocks
// -------------------------------------------------------------------

/// Vector memory with deterministic token-Jaccard relevance. Identical
/// texts score exactly 1.0.
#[derive(Default)]
struct MockVectorMemory {
    records: Mutex<HashMap<String, Vec<(String, String)>>>,
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

#[async_trait]
impl VectorMemory for MockVectorMemory {
    async fn save(&self, index: &str, id: &str, text: &str) -> Result<()> {
        let mut records = self.records.lock();
        let entries = records.entry(index.to_string()).or_default();
        if let Some(entry) = entries.iter_mut().find(|(eid, _)| eid == id) {
            entry.1 = text.to_string();
        } else {
            entries.push((id.to_string(), text.to_string()));
        }
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        limit: usize,
        min_relevance: f64,
    ) -> Result<Vec<VectorHit>> {
        let query_tokens = token_set(query);
        let records = self.records.lock();
        let mut hits: Vec<VectorHit> = records
            .get(index)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(id, text)| {
                        let relevance = if text == query {
                            1.0
                        } else {
                            jaccard(&query_tokens, &token_set(text))
                        };
                        if relevance >= min_relevance {
                            Some(VectorHit {
                                id: id.clone(),
                                text: text.clone(),
                                relevance,
                            })
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap());
        hits.truncate(limit);
        Ok(hits)
    }

    async fn remove(&self, index: &str, id: &str) -> Result<()> {
        if let Some(entries) = self.records.lock().get_mut(index) {
            entries.retain(|(eid, _)| eid != id);
        }
        Ok(())
    }
}

impl MockVectorMemory {
    fn count(&self, index: &str) -> usize {
        self.records.lock().get(index).map(|e| e.len()).unwrap_or(0)
    }
}

/// Semantic client with scripted extraction payloads. Description merges
/// return empty so the engine exercises its deterministic fallback.
struct ScriptedSemantic {
    payloads: Mutex<VecDeque<GraphPayload>>,
    relate: bool,
    fail_extract: bool,
    answer_calls: AtomicUsize,
}

impl ScriptedSemantic {
    fn new(payloads: Vec<GraphPayload>, relate: bool) -> Self {
        Self {
            payloads: Mutex::new(payloads.into()),
            relate,
            fail_extract: false,
            answer_calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            payloads: Mutex::new(VecDeque::new()),
            relate: false,
            fail_extract: true,
            answer_calls: AtomicUsize::new(0),
        }
    }

    fn answer_count(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticClient for ScriptedSemantic {
    async fn extract_graph(&self, _text: &str) -> Result<GraphPayload> {
        if self.fail_extract {
            return Err(Error::Semantic("scripted extraction failure".into()));
        }
        Ok(self.payloads.lock().pop_front().unwrap_or_default())
    }

    async fn merge_descriptions(&self, _a: &str, _b: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn infer_relation(&self, _desc_a: &str, _desc_b: &str) -> Result<RelationJudgement> {
        Ok(RelationJudgement {
            related: self.relate,
            source: RelationSource::Node1,
            relationship: "related to".into(),
        })
    }

    async fn summarize_community(&self, member_block: &str) -> Result<String> {
        Ok(format!("community of {} members", member_block.lines().count()))
    }

    async fn summarize_global(&self, community_block: &str) -> Result<String> {
        Ok(format!("global over {} communities", community_block.lines().count()))
    }

    async fn answer(&self, _subgraph_json: &str, _question: &str) -> Result<String> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        Ok("the answer".into())
    }

    fn answer_stream(&self, _subgraph_json: &str, _question: &str) -> AnswerStream {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::stream::iter(vec![
            Ok("the ".to_string()),
            Ok("answer".to_string()),
        ]))
    }
}

// -------------------------------------------------------------------
// Harness
// -------------------------------------------------------------------

struct Harness {
    engine: Arc<GraphEngine>,
    repo: Arc<SqliteRepository>,
    vectors: Arc<MockVectorMemory>,
    semantic: Arc<ScriptedSemantic>,
    _dir: TempDir,
}

fn harness_with(
    semantic: ScriptedSemantic,
    search: GraphSearchConfig,
    chunker: ChunkerConfig,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(SqliteRepository::open(dir.path()).unwrap());
    let vectors = Arc::new(MockVectorMemory::default());
    let semantic = Arc::new(semantic);
    let engine = Arc::new(GraphEngine::new(
        repo.clone(),
        vectors.clone(),
        semantic.clone(),
        &chunker,
        search,
    ));
    Harness {
        engine,
        repo,
        vectors,
        semantic,
        _dir: dir,
    }
}

fn harness(payloads: Vec<GraphPayload>, relate: bool) -> Harness {
    harness_with(
        ScriptedSemantic::new(payloads, relate),
        GraphSearchConfig::default(),
        ChunkerConfig::default(),
    )
}

fn payload(nodes: &[(&str, &str, &str, &str)], edges: &[(&str, &str, &str)]) -> GraphPayload {
    GraphPayload {
        nodes: nodes
            .iter()
            .map(|(local_id, name, node_type, desc)| ExtractedNode {
                local_id: local_id.to_string(),
                name: name.to_string(),
                node_type: node_type.to_string(),
                desc: desc.to_string(),
            })
            .collect(),
        edges: edges
            .iter()
            .map(|(source, target, relationship)| ExtractedEdge {
                source_local_id: source.to_string(),
                target_local_id: target.to_string(),
                relationship: relationship.to_string(),
            })
            .collect(),
    }
}

async fn seed_node(h: &Harness, index: &str, id: &str, name: &str, node_type: &str, desc: &str) {
    let node = Node {
        id: id.into(),
        index: index.into(),
        name: name.into(),
        node_type: node_type.into(),
        desc: desc.into(),
    };
    h.repo.add_node(&node).await.unwrap();
    h.vectors.save(index, id, &node.desc_text()).await.unwrap();
}

async fn seed_edge(h: &Harness, index: &str, id: &str, source: &str, target: &str) {
    h.repo
        .add_edge(&Edge {
            id: id.into(),
            index: index.into(),
            source: source.into(),
            target: target.into(),
            relationship: "linked".into(),
        })
        .await
        .unwrap();
}

// -------------------------------------------------------------------
// Ingest
// -------------------------------------------------------------------

#[tokio::test]
async fn test_insert_validates_inputs() {
    let h = harness(vec![], false);
    assert!(matches!(
        h.engine.insert_graph_data("", "text").await,
        Err(Error::InputValidation(_))
    ));
    assert!(matches!(
        h.engine.insert_graph_data("a", "  ").await,
        Err(Error::InputValidation(_))
    ));
}

#[tokio::test]
async fn test_extraction_failure_is_swallowed() {
    let h = harness_with(
        ScriptedSemantic::failing(),
        GraphSearchConfig::default(),
        ChunkerConfig::default(),
    );
    h.engine.insert_graph_data("a", "some text").await.unwrap();
    assert!(h.repo.get_nodes_by_index("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exact_name_merge_accumulates_descriptions() {
    let h = harness(
        vec![
            payload(&[("1", "Alice", "Person", "is a doctor")], &[]),
            payload(&[("1", "Alice", "Person", "works in Berlin")], &[]),
        ],
        false,
    );

    h.engine.insert_graph_data("a", "Alice is a doctor.").await.unwrap();
    h.engine.insert_graph_data("a", "Alice works in Berlin.").await.unwrap();

    let nodes = h.repo.get_nodes_by_index("a").await.unwrap();
    assert_eq!(nodes.len(), 1, "same name must merge, not duplicate");
    assert_eq!(nodes[0].name, "Alice");
    assert!(nodes[0].desc.contains("is a doctor"));
    assert!(nodes[0].desc.contains("works in Berlin"));

    // The merge updates the vector entry in place.
    assert_eq!(h.vectors.count("a"), 1);
}

#[tokio::test]
async fn test_same_name_within_one_chunk_merges() {
    let h = harness(
        vec![payload(
            &[
                ("1", "Dup", "Concept", "first mention"),
                ("2", "Dup", "Concept", "second mention"),
            ],
            &[],
        )],
        false,
    );
    h.engine.insert_graph_data("a", "text").await.unwrap();

    let nodes = h.repo.get_nodes_by_index("a").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].desc.contains("second mention"));
}

#[tokio::test]
async fn test_vector_identity_reuses_existing_node() {
    let h = harness(
        vec![payload(
            &[
                ("1", "NYC", "City", "largest US city"),
                ("2", "Hudson", "River", "a river"),
            ],
            &[("1", "2", "lies on")],
        )],
        false,
    );

    // A node stored under another name whose vector text matches the
    // extraction exactly.
    h.repo
        .add_node(&Node {
            id: "city-1".into(),
            index: "a".into(),
            name: "New York City".into(),
            node_type: "City".into(),
            desc: "largest US city".into(),
        })
        .await
        .unwrap();
    h.vectors
        .save("a", "city-1", "Name:NYC;Type:City;Desc:largest US city")
        .await
        .unwrap();

    h.engine.insert_graph_data("a", "text").await.unwrap();

    let nodes = h.repo.get_nodes_by_index("a").await.unwrap();
    assert_eq!(nodes.len(), 2, "no new node for the semantic duplicate");
    assert!(nodes.iter().any(|n| n.name == "New York City"));
    assert!(nodes.iter().all(|n| n.name != "NYC"));

    let hudson = nodes.iter().find(|n| n.name == "Hudson").unwrap();
    let edge = h
        .repo
        .get_edge_between("a", "city-1", &hudson.id)
        .await
        .unwrap()
        .expect("edge must attach to the reused node");
    assert_eq!(edge.source, "city-1");
    assert_eq!(edge.relationship, "lies on");
}

#[tokio::test]
async fn test_orphan_repair_stops_after_two_edges() {
    let h = harness(
        vec![payload(
            &[("1", "Solo", "Concept", "alpha beta gamma delta")],
            &[],
        )],
        true,
    );

    // Three neighbours share enough vocabulary to clear the 0.5 repair
    // threshold but stay under the 0.7 dedup threshold.
    for i in 1..=3 {
        seed_node(
            &h,
            "a",
            &format!("anchor-{}", i),
            &format!("Anchor{}", i),
            "Thing",
            &format!("alpha beta gamma delta extra{}", i),
        )
        .await;
    }

    h.engine.insert_graph_data("a", "text").await.unwrap();

    let nodes = h.repo.get_nodes_by_index("a").await.unwrap();
    let solo = nodes.iter().find(|n| n.name == "Solo").unwrap();
    let edges = h.repo.get_edges_by_index("a").await.unwrap();
    let incident = edges
        .iter()
        .filter(|e| e.source == solo.id || e.target == solo.id)
        .count();
    assert_eq!(incident, 2, "repair stops after two successful insertions");
}

#[tokio::test]
async fn test_duplicate_edges_merge_labels() {
    let h = harness(
        vec![payload(
            &[
                ("1", "Alice", "Person", "a doctor"),
                ("2", "Bob", "Person", "an engineer"),
            ],
            &[("1", "2", "knows"), ("2", "1", "works with")],
        )],
        false,
    );

    h.engine.insert_graph_data("a", "text").await.unwrap();

    let edges = h.repo.get_edges_by_index("a").await.unwrap();
    assert_eq!(edges.len(), 1, "one undirected edge per endpoint pair");
    assert!(edges[0].relationship.contains("knows"));
    assert!(edges[0].relationship.contains("works with"));
}

#[tokio::test]
async fn test_duplicate_edges_same_label_collapse() {
    let h = harness(
        vec![payload(
            &[
                ("1", "Alice", "Person", "a doctor"),
                ("2", "Bob", "Person", "an engineer"),
            ],
            &[("1", "2", "knows"), ("1", "2", "knows")],
        )],
        false,
    );

    h.engine.insert_graph_data("a", "text").await.unwrap();

    let edges = h.repo.get_edges_by_index("a").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].relationship, "knows");
}

#[tokio::test]
async fn test_unresolved_edge_endpoints_skipped() {
    let h = harness(
        vec![payload(
            &[("1", "Alice", "Person", "a doctor")],
            &[("1", "99", "knows")],
        )],
        false,
    );

    h.engine.insert_graph_data("a", "text").await.unwrap();

    // The dangling local id is skipped; Alice becomes an orphan with no
    // repair candidates, so the graph has one node and no edges.
    assert_eq!(h.repo.get_nodes_by_index("a").await.unwrap().len(), 1);
    assert!(h.repo.get_edges_by_index("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_insert_chunked_feeds_each_window() {
    let h = harness_with(
        ScriptedSemantic::new(
            vec![
                payload(&[("1", "A", "Concept", "first window")], &[]),
                payload(&[("1", "B", "Concept", "second window")], &[]),
            ],
            false,
        ),
        GraphSearchConfig::default(),
        ChunkerConfig {
            lines_per_split: 1,
            tokens_per_paragraph: 1,
        },
    );

    let windows = h.engine.insert_chunked("a", "p0\np1\np2\np3\np4").await.unwrap();
    assert_eq!(windows, 2);

    let nodes = h.repo.get_nodes_by_index("a").await.unwrap();
    assert_eq!(nodes.len(), 2);
}

// -------------------------------------------------------------------
// Retrieval
// -------------------------------------------------------------------

#[tokio::test]
async fn test_search_empty_index_returns_empty_without_model_call() {
    let h = harness(vec![], false);
    let answer = h.engine.search_graph("empty", "hi").await.unwrap();
    assert_eq!(answer, "");
    assert_eq!(h.semantic.answer_count(), 0);
}

#[tokio::test]
async fn test_search_answers_over_subgraph() {
    let h = harness(vec![], false);
    seed_node(&h, "a", "n1", "Alice", "Person", "a doctor in Berlin").await;
    seed_node(&h, "a", "n2", "Bob", "Person", "an engineer in Berlin").await;
    seed_edge(&h, "a", "e1", "n1", "n2").await;

    let answer = h
        .engine
        .search_graph("a", "Name:Alice;Type:Person;Desc:a doctor in Berlin")
        .await
        .unwrap();
    assert_eq!(answer, "the answer");
    assert_eq!(h.semantic.answer_count(), 1);
}

#[tokio::test]
async fn test_retrieve_widens_when_first_pass_is_thin() {
    let h = harness_with(
        ScriptedSemantic::new(vec![], false),
        GraphSearchConfig {
            search_min_relevance: 0.6,
            ..Default::default()
        },
        ChunkerConfig::default(),
    );
    // Jaccard("alpha beta gamma", "alpha beta delta epsilon") = 2/5 = 0.4:
    // below the configured 0.6, above the widened 0.4 floor.
    h.vectors
        .save("a", "n1", "alpha beta delta epsilon")
        .await
        .unwrap();

    let hits = h.engine.retrieve_relevant("a", "alpha beta gamma").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "n1");
}

#[tokio::test]
async fn test_subgraph_respects_node_bound_on_chain() {
    let h = harness_with(
        ScriptedSemantic::new(vec![], false),
        GraphSearchConfig {
            max_nodes: 4,
            node_depth: 3,
            ..Default::default()
        },
        ChunkerConfig::default(),
    );
    for i in 0..10 {
        seed_node(&h, "a", &format!("n{}", i), &format!("N{}", i), "Concept", "x").await;
    }
    for i in 0..9 {
        seed_edge(&h, "a", &format!("e{}", i), &format!("n{}", i), &format!("n{}", i + 1)).await;
    }

    let seeds = h.repo.get_nodes_by_ids("a", &["n0".into()]).await.unwrap();
    let mut weights: HashMap<String, f64> = [("n0".to_string(), 1.0)].into();
    let (nodes, edges) = h.engine.build_subgraph("a", seeds, &mut weights).await.unwrap();

    assert!(nodes.len() <= 4);
    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for e in &edges {
        assert!(kept.contains(e.source.as_str()) && kept.contains(e.target.as_str()));
    }
}

#[tokio::test]
async fn test_subgraph_overflow_keeps_top_weighted() {
    let h = harness_with(
        ScriptedSemantic::new(vec![], false),
        GraphSearchConfig {
            max_nodes: 3,
            node_depth: 2,
            ..Default::default()
        },
        ChunkerConfig::default(),
    );
    seed_node(&h, "a", "hub", "Hub", "Concept", "center").await;
    for i in 0..5 {
        let id = format!("spoke{}", i);
        seed_node(&h, "a", &id, &format!("Spoke{}", i), "Concept", "leaf").await;
        seed_edge(&h, "a", &format!("e{}", i), "hub", &id).await;
    }

    let seeds = h.repo.get_nodes_by_ids("a", &["hub".into()]).await.unwrap();
    let mut weights: HashMap<String, f64> = [("hub".to_string(), 1.0)].into();
    let (nodes, edges) = h.engine.build_subgraph("a", seeds, &mut weights).await.unwrap();

    assert_eq!(nodes.len(), 3);
    assert!(nodes.iter().any(|n| n.id == "hub"), "seed has the top weight");
    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for e in &edges {
        assert!(kept.contains(e.source.as_str()) && kept.contains(e.target.as_str()));
    }
}

#[tokio::test]
async fn test_stream_is_empty_for_empty_subgraph() {
    let h = harness(vec![], false);
    let mut stream = h.engine.clone().search_graph_stream("empty".into(), "hi".into());
    assert!(stream.next().await.is_none());
    assert_eq!(h.semantic.answer_count(), 0);
}

#[tokio::test]
async fn test_stream_forwards_fragments() {
    let h = harness(vec![], false);
    seed_node(&h, "a", "n1", "Alice", "Person", "a doctor in Berlin").await;

    let mut stream = h.engine.clone().search_graph_stream(
        "a".into(),
        "Name:Alice;Type:Person;Desc:a doctor in Berlin".into(),
    );
    let mut collected = String::new();
    while let Some(fragment) = stream.next().await {
        collected.push_str(&fragment.unwrap());
    }
    assert_eq!(collected, "the answer");
}

// -------------------------------------------------------------------
// Communities, global summary, deletion
// -------------------------------------------------------------------

async fn seed_two_triangles(h: &Harness) {
    for id in ["t1", "t2", "t3", "u1", "u2", "u3", "lonely"] {
        seed_node(h, "a", id, &id.to_uppercase(), "Concept", "member").await;
    }
    for (eid, s, t) in [
        ("e1", "t1", "t2"),
        ("e2", "t2", "t3"),
        ("e3", "t3", "t1"),
        ("e4", "u1", "u2"),
        ("e5", "u2", "u3"),
        ("e6", "u3", "u1"),
    ] {
        seed_edge(h, "a", eid, s, t).await;
    }
}

#[tokio::test]
async fn test_rebuild_communities_covers_connected_nodes() {
    let h = harness(vec![], false);
    seed_two_triangles(&h).await;

    h.engine.rebuild_communities("a").await.unwrap();

    let memberships = h.repo.get_memberships("a").await.unwrap();
    assert_eq!(memberships.len(), 6, "isolated node gets no membership");

    let mut per_node: HashMap<&str, usize> = HashMap::new();
    for m in &memberships {
        *per_node.entry(m.node_id.as_str()).or_default() += 1;
    }
    assert!(per_node.values().all(|&c| c == 1));

    let communities = h.repo.get_communities("a").await.unwrap();
    let referenced: HashSet<&str> = memberships.iter().map(|m| m.community_id.as_str()).collect();
    assert_eq!(communities.len(), referenced.len());
    assert!(communities.iter().all(|c| !c.summaries.is_empty()));
}

#[tokio::test]
async fn test_rebuild_communities_wipes_previous_run() {
    let h = harness(vec![], false);
    seed_two_triangles(&h).await;

    h.engine.rebuild_communities("a").await.unwrap();
    h.engine.rebuild_communities("a").await.unwrap();

    let memberships = h.repo.get_memberships("a").await.unwrap();
    assert_eq!(memberships.len(), 6);
}

#[tokio::test]
async fn test_rebuild_global_from_community_summaries() {
    let h = harness(vec![], false);
    seed_two_triangles(&h).await;

    h.engine.rebuild_communities("a").await.unwrap();
    h.engine.rebuild_global("a").await.unwrap();

    let global = h.repo.get_global("a").await.unwrap().unwrap();
    assert!(global.summaries.starts_with("global over"));
}

#[tokio::test]
async fn test_rebuild_global_without_communities_is_noop() {
    let h = harness(vec![], false);
    h.engine.rebuild_global("a").await.unwrap();
    assert!(h.repo.get_global("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_index_clears_everything() {
    let h = harness(
        vec![payload(
            &[
                ("1", "Alice", "Person", "a doctor"),
                ("2", "Bob", "Person", "an engineer"),
            ],
            &[("1", "2", "knows")],
        )],
        false,
    );

    h.engine.insert_graph_data("a", "text").await.unwrap();
    h.engine.rebuild_communities("a").await.unwrap();
    h.engine.rebuild_global("a").await.unwrap();

    h.engine.delete_index("a").await.unwrap();

    assert!(h.repo.get_nodes_by_index("a").await.unwrap().is_empty());
    assert!(h.repo.get_edges_by_index("a").await.unwrap().is_empty());
    assert!(h.repo.get_memberships("a").await.unwrap().is_empty());
    assert!(h.repo.get_communities("a").await.unwrap().is_empty());
    assert!(h.repo.get_global("a").await.unwrap().is_none());
    assert_eq!(h.vectors.count("a"), 0);
}
