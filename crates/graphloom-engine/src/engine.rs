//! The graph engine: ingest, dedup, orphan repair, summarization, retrieval.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use graphloom_core::config::{ChunkerConfig, GraphSearchConfig};
use graphloom_core::{Error, Result};
use graphloom_semantic::{AnswerStream, RelationSource, SemanticClient};
use graphloom_store::{Community, CommunityMembership, Edge, GlobalSummary, Node, Repository};
use graphloom_vector::{VectorHit, VectorMemory};

use crate::chunker::TextChunker;
use crate::community::detect_communities;
use crate::tokens::truncate_to_budget;

/// Vector search parameters for the per-node dedup pass.
const DEDUP_LIMIT: usize = 5;
const DEDUP_MIN_RELEVANCE: f64 = 0.7;

/// Vector search parameters for orphan repair.
const ORPHAN_DESC_LIMIT: usize = 10;
const ORPHAN_DESC_MIN_RELEVANCE: f64 = 0.5;
const ORPHAN_NAME_LIMIT: usize = 5;
const ORPHAN_NAME_MIN_RELEVANCE: f64 = 0.6;
const ORPHAN_MIN_CANDIDATES: usize = 3;
const ORPHAN_RESOLVE_LIMIT: usize = 10;
const ORPHAN_JUDGE_LIMIT: usize = 5;
const ORPHAN_MAX_NEW_EDGES: usize = 2;

/// Frontier width and weight decay for subgraph expansion.
const FRONTIER_WIDTH: usize = 5;
const WEIGHT_DECAY: f64 = 0.8;

/// Retrieval retry floor and widening.
const RETRY_FLOOR: f64 = 0.3;
const RETRY_RELEVANCE_DROP: f64 = 0.2;
const RETRY_EXTRA_LIMIT: usize = 2;

/// Orchestrates graph construction and retrieval over the repository,
/// the vector memory and the semantic client.
///
/// Ingest is serialized per index so that concurrent inserts cannot create
/// duplicate nodes for the same name.
pub struct GraphEngine {
    repo: Arc<dyn Repository>,
    vectors: Arc<dyn VectorMemory>,
    semantic: Arc<dyn SemanticClient>,
    chunker: TextChunker,
    search: GraphSearchConfig,
    ingest_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InputValidation(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn extracted_desc_text(name: &str, node_type: &str, desc: &str) -> String {
    format!("Name:{};Type:{};Desc:{}", name, node_type, desc)
}

fn subgraph_json(nodes: &[Node], edges: &[Edge], extra: Option<serde_json::Value>) -> String {
    let mut value = serde_json::json!({
        "nodes": nodes.iter().map(|n| serde_json::json!({
            "id": n.id,
            "name": n.name,
            "type": n.node_type,
            "desc": n.desc,
        })).collect::<Vec<_>>(),
        "edges": edges.iter().map(|e| serde_json::json!({
            "source": e.source,
            "target": e.target,
            "relationship": e.relationship,
        })).collect::<Vec<_>>(),
    });
    if let Some(serde_json::Value::Object(map)) = extra {
        for (k, v) in map {
            value[k.as_str()] = v;
        }
    }
    value.to_string()
}

impl GraphEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        vectors: Arc<dyn VectorMemory>,
        semantic: Arc<dyn SemanticClient>,
        chunker_config: &ChunkerConfig,
        search: GraphSearchConfig,
    ) -> Self {
        Self {
            repo,
            vectors,
            semantic,
            chunker: TextChunker::new(chunker_config),
            search,
            ingest_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    fn ingest_lock(&self, index: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.ingest_locks
            .lock()
            .entry(index.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    // -----------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------

    /// Extract a graph from `text` and merge it into `index`.
    ///
    /// Pipeline failures are logged and swallowed so that subsequent chunks
    /// of the same document still ingest; only input validation errors are
    /// surfaced to the caller.
    pub async fn insert_graph_data(&self, index: &str, text: &str) -> Result<()> {
        require(index, "index")?;
        require(text, "text")?;

        let lock = self.ingest_lock(index);
        let _guard = lock.lock().await;

        if let Err(e) = self.ingest_chunk(index, text).await {
            warn!("Ingest failed for index {}: {}", index, e);
        }
        Ok(())
    }

    /// Chunk `text` into overlapping windows and ingest each independently.
    /// Returns the number of windows.
    pub async fn insert_chunked(&self, index: &str, text: &str) -> Result<usize> {
        require(index, "index")?;
        require(text, "text")?;

        let windows = self.chunker.chunk(text);
        for window in &windows {
            self.insert_graph_data(index, window).await?;
        }
        Ok(windows.len())
    }

    async fn ingest_chunk(&self, index: &str, text: &str) -> Result<()> {
        let payload = self.semantic.extract_graph(text).await?;
        debug!(
            "Extracted {} nodes / {} edges for index {}",
            payload.nodes.len(),
            payload.edges.len(),
            index
        );

        let mut existing = self.repo.get_nodes_by_index(index).await?;
        let mut local_to_persisted: HashMap<String, String> = HashMap::new();
        let mut created: Vec<Node> = Vec::new();

        for extracted in &payload.nodes {
            // Exact-name merge against the snapshot and this call's creations.
            let known = existing
                .iter_mut()
                .chain(created.iter_mut())
                .find(|n| n.name == extracted.name);
            if let Some(node) = known {
                if !extracted.desc.is_empty() {
                    let merged = self
                        .merge_desc_with_fallback(&node.desc, &extracted.desc)
                        .await?;
                    node.desc = merged;
                    self.repo
                        .update_node_desc(index, &node.id, &node.desc)
                        .await?;
                    self.vectors
                        .save(index, &node.id, &node.desc_text())
                        .await?;
                }
                local_to_persisted.insert(extracted.local_id.clone(), node.id.clone());
                continue;
            }

            // Vector-identity merge: an exact semantic duplicate under a
            // different name reuses the stored node.
            let desc_text =
                extracted_desc_text(&extracted.name, &extracted.node_type, &extracted.desc);
            let hits = self
                .vectors
                .search(index, &desc_text, DEDUP_LIMIT, DEDUP_MIN_RELEVANCE)
                .await?;
            if let Some(first) = hits.first() {
                if first.relevance == 1.0 {
                    local_to_persisted.insert(extracted.local_id.clone(), first.id.clone());
                    continue;
                }
            }
            let potential_related: Vec<String> = hits.into_iter().map(|h| h.id).collect();

            // Create the node.
            let node = Node {
                id: Uuid::new_v4().to_string(),
                index: index.to_string(),
                name: extracted.name.clone(),
                node_type: extracted.node_type.clone(),
                desc: extracted.desc.clone(),
            };
            self.repo.add_node(&node).await?;
            self.vectors.save(index, &node.id, &node.desc_text()).await?;
            local_to_persisted.insert(extracted.local_id.clone(), node.id.clone());

            // Opportunistic relation inference against the dedup candidates.
            for candidate_id in &potential_related {
                let candidate = existing
                    .iter()
                    .chain(created.iter())
                    .find(|n| &n.id == candidate_id)
                    .cloned();
                let candidate = match candidate {
                    Some(c) => c,
                    None => continue,
                };
                self.try_infer_edge(index, &candidate, &node).await?;
            }

            created.push(node);
        }

        // Resolve extracted edges through the local id map.
        for extracted in &payload.edges {
            let source = local_to_persisted.get(&extracted.source_local_id);
            let target = local_to_persisted.get(&extracted.target_local_id);
            let (source, target) = match (source, target) {
                (Some(s), Some(t)) if s != t => (s.clone(), t.clone()),
                _ => continue,
            };
            let edge = Edge {
                id: Uuid::new_v4().to_string(),
                index: index.to_string(),
                source,
                target,
                relationship: extracted.relationship.clone(),
            };
            match self.repo.add_edge(&edge).await {
                Ok(()) => {}
                Err(Error::Integrity(reason)) => debug!("Dropped extracted edge: {}", reason),
                Err(e) => return Err(e),
            }
        }

        // Orphan repair over the nodes created in this call.
        for node in &created {
            let edges = self.repo.get_edges_by_index(index).await?;
            let connected = edges
                .iter()
                .any(|e| e.source == node.id || e.target == node.id);
            if !connected {
                self.attempt_connect_orphan(index, node).await?;
            }
        }

        self.dedup_edges(index).await?;
        Ok(())
    }

    async fn merge_desc_with_fallback(&self, a: &str, b: &str) -> Result<String> {
        let merged = self.semantic.merge_descriptions(a, b).await?;
        if merged.is_empty() {
            Ok(format!("{}; {}", a, b))
        } else {
            Ok(merged)
        }
    }

    /// Judge `candidate` against `node` and insert the oriented edge when the
    /// endpoints are related and not yet connected. Returns whether an edge
    /// was inserted.
    async fn try_infer_edge(&self, index: &str, candidate: &Node, node: &Node) -> Result<bool> {
        let judgement = self
            .semantic
            .infer_relation(&candidate.desc_text(), &node.desc_text())
            .await?;
        if !judgement.related {
            return Ok(false);
        }
        if self
            .repo
            .get_edge_between(index, &candidate.id, &node.id)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let (source, target) = match judgement.source {
            RelationSource::Node1 => (candidate.id.clone(), node.id.clone()),
            RelationSource::Node2 => (node.id.clone(), candidate.id.clone()),
        };
        let edge = Edge {
            id: Uuid::new_v4().to_string(),
            index: index.to_string(),
            source,
            target,
            relationship: judgement.relationship,
        };
        match self.repo.add_edge(&edge).await {
            Ok(()) => Ok(true),
            Err(Error::Integrity(reason)) => {
                debug!("Dropped inferred edge: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Connect a just-created node with zero incident edges to its vector
    /// neighbours, stopping after two successful insertions.
    async fn attempt_connect_orphan(&self, index: &str, orphan: &Node) -> Result<()> {
        let mut candidates: Vec<String> = Vec::new();
        let push_hits = |hits: Vec<VectorHit>, candidates: &mut Vec<String>| {
            for hit in hits {
                if hit.id != orphan.id && !candidates.contains(&hit.id) {
                    candidates.push(hit.id);
                }
            }
        };

        let by_desc = self
            .vectors
            .search(
                index,
                &orphan.desc_text(),
                ORPHAN_DESC_LIMIT,
                ORPHAN_DESC_MIN_RELEVANCE,
            )
            .await?;
        push_hits(by_desc, &mut candidates);

        if candidates.len() < ORPHAN_MIN_CANDIDATES {
            let by_name = self
                .vectors
                .search(
                    index,
                    &orphan.name,
                    ORPHAN_NAME_LIMIT,
                    ORPHAN_NAME_MIN_RELEVANCE,
                )
                .await?;
            push_hits(by_name, &mut candidates);
        }

        candidates.truncate(ORPHAN_RESOLVE_LIMIT);
        let resolved = self.repo.get_nodes_by_ids(index, &candidates).await?;
        let by_id: HashMap<&str, &Node> = resolved.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut inserted = 0usize;
        for candidate_id in candidates.iter().take(ORPHAN_JUDGE_LIMIT) {
            if inserted >= ORPHAN_MAX_NEW_EDGES {
                break;
            }
            let candidate = match by_id.get(candidate_id.as_str()) {
                Some(c) => (*c).clone(),
                None => continue,
            };
            if self.try_infer_edge(index, &candidate, orphan).await? {
                inserted += 1;
            }
        }
        if inserted > 0 {
            info!(
                "Connected orphan {} ({}) with {} edge(s)",
                orphan.name, orphan.id, inserted
            );
        }
        Ok(())
    }

    /// Collapse duplicate undirected edges, semantically merging labels.
    async fn dedup_edges(&self, index: &str) -> Result<()> {
        let edges = self.repo.get_edges_by_index(index).await?;
        let mut groups: HashMap<(String, String), Vec<Edge>> = HashMap::new();
        for edge in edges {
            groups.entry(edge.unordered_key()).or_default().push(edge);
        }

        for (_, mut group) in groups {
            if group.len() < 2 {
                continue;
            }
            let mut primary = group.remove(0);
            for extra in group {
                if extra.relationship != primary.relationship {
                    let merged = self
                        .merge_desc_with_fallback(&primary.relationship, &extra.relationship)
                        .await?;
                    primary.relationship = merged;
                    self.repo
                        .update_edge_relationship(index, &primary.id, &primary.relationship)
                        .await?;
                }
                self.repo.delete_edge(index, &extra.id).await?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------

    /// Vector retrieval with a single widened retry when the first pass
    /// comes back nearly empty.
    pub async fn retrieve_relevant(&self, index: &str, query: &str) -> Result<Vec<VectorHit>> {
        let threshold = self.search.search_min_relevance;
        let mut hits = self
            .vectors
            .search(index, query, self.search.search_limit, threshold)
            .await?;

        if hits.len() < 2 && threshold > RETRY_FLOOR {
            let relaxed = (threshold - RETRY_RELEVANCE_DROP).max(RETRY_FLOOR);
            let widened = self
                .vectors
                .search(
                    index,
                    query,
                    self.search.search_limit + RETRY_EXTRA_LIMIT,
                    relaxed,
                )
                .await?;
            let seen: HashSet<String> = hits.iter().map(|h| h.id.clone()).collect();
            hits.extend(widened.into_iter().filter(|h| !seen.contains(&h.id)));
        }

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(hits)
    }

    /// Weighted bounded BFS from the seed nodes.
    ///
    /// Neighbour discovery walks edges touching the frontier; the edges kept
    /// in the result always have both endpoints inside the collected node
    /// set, and the final cut keeps the top-weighted `max_nodes`.
    pub async fn build_subgraph(
        &self,
        index: &str,
        seeds: Vec<Node>,
        weights: &mut HashMap<String, f64>,
    ) -> Result<(Vec<Node>, Vec<Edge>)> {
        let all_edges = self.repo.get_edges_by_index(index).await?;

        let mut nodes: Vec<Node> = seeds.clone();
        let mut node_ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut frontier: Vec<Node> = seeds;
        let mut depth = 0usize;

        while depth < self.search.node_depth && nodes.len() < self.search.max_nodes {
            frontier.sort_by(|a, b| {
                let wa = weights.get(&a.id).copied().unwrap_or(0.0);
                let wb = weights.get(&b.id).copied().unwrap_or(0.0);
                wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
            });
            frontier.truncate(FRONTIER_WIDTH);

            let frontier_ids: HashSet<&str> = frontier.iter().map(|n| n.id.as_str()).collect();
            let mut new_node_ids: Vec<String> = Vec::new();
            let mut discovered: HashSet<String> = HashSet::new();
            for edge in &all_edges {
                let source_in = node_ids.contains(&edge.source)
                    || frontier_ids.contains(edge.source.as_str());
                let target_in = node_ids.contains(&edge.target)
                    || frontier_ids.contains(edge.target.as_str());
                let other = match (source_in, target_in) {
                    (true, false) => &edge.target,
                    (false, true) => &edge.source,
                    _ => continue,
                };
                if !node_ids.contains(other) && discovered.insert(other.clone()) {
                    new_node_ids.push(other.clone());
                }
            }

            if new_node_ids.is_empty() {
                break;
            }

            let max_weight = weights.values().fold(0.0f64, |acc, &w| acc.max(w));
            let inherited = WEIGHT_DECAY * max_weight;
            let fetched = self.repo.get_nodes_by_ids(index, &new_node_ids).await?;
            for node in &fetched {
                weights.entry(node.id.clone()).or_insert(inherited);
                node_ids.insert(node.id.clone());
            }
            nodes.extend(fetched.clone());
            frontier = fetched;
            depth += 1;
        }

        // Collect edges fully inside the final node set, first-seen per
        // undirected pair.
        let id_list: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let inner = self.repo.get_edges_by_node_ids(index, &id_list).await?;
        let mut edges: Vec<Edge> = Vec::new();
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
        for edge in inner {
            if seen_pairs.insert(edge.unordered_key()) {
                edges.push(edge);
            }
        }

        // Enforce the node bound by weight, dropping edges that lose an
        // endpoint.
        if nodes.len() > self.search.max_nodes {
            nodes.sort_by(|a, b| {
                let wa = weights.get(&a.id).copied().unwrap_or(0.0);
                let wb = weights.get(&b.id).copied().unwrap_or(0.0);
                wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
            });
            nodes.truncate(self.search.max_nodes);
            let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            edges.retain(|e| {
                kept.contains(e.source.as_str()) && kept.contains(e.target.as_str())
            });
        }

        Ok((nodes, edges))
    }

    /// Retrieve seeds, expand, truncate to the token budget, and render the
    /// subgraph JSON. `None` when nothing relevant was found.
    async fn assemble_subgraph(
        &self,
        index: &str,
        query: &str,
    ) -> Result<Option<(Vec<Node>, Vec<Edge>, HashMap<String, f64>)>> {
        let hits = self.retrieve_relevant(index, query).await?;
        if hits.is_empty() {
            return Ok(None);
        }

        let mut weights: HashMap<String, f64> =
            hits.iter().map(|h| (h.id.clone(), h.relevance)).collect();
        let seed_ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let seeds = self.repo.get_nodes_by_ids(index, &seed_ids).await?;
        if seeds.is_empty() {
            return Ok(None);
        }

        let (nodes, edges) = self.build_subgraph(index, seeds, &mut weights).await?;
        let (nodes, edges) =
            truncate_to_budget(nodes, edges, &weights, self.search.max_tokens);
        if nodes.is_empty() {
            return Ok(None);
        }
        Ok(Some((nodes, edges, weights)))
    }

    /// Answer a question over the query-relevant subgraph. Returns an empty
    /// string without calling the model when the subgraph is empty.
    pub async fn search_graph(&self, index: &str, query: &str) -> Result<String> {
        require(index, "index")?;
        require(query, "query")?;

        let subgraph = match self.assemble_subgraph(index, query).await? {
            Some(s) => s,
            None => return Ok(String::new()),
        };
        let json = subgraph_json(&subgraph.0, &subgraph.1, None);
        self.semantic.answer(&json, query).await
    }

    /// Streaming variant of [`search_graph`]. Yields nothing when the
    /// subgraph is empty.
    pub fn search_graph_stream(self: Arc<Self>, index: String, query: String) -> AnswerStream {
        Box::pin(async_stream::stream! {
            if let Err(e) = require(&index, "index").and_then(|_| require(&query, "query")) {
                yield Err(e);
                return;
            }

            let subgraph = match self.assemble_subgraph(&index, &query).await {
                Ok(Some(s)) => s,
                Ok(None) => return,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let json = subgraph_json(&subgraph.0, &subgraph.1, None);
            let mut inner = self.semantic.answer_stream(&json, &query);
            while let Some(fragment) = futures::StreamExt::next(&mut inner).await {
                yield fragment;
            }
        })
    }

    /// As [`search_graph`], with the community and global summaries of the
    /// subgraph's members attached as extra context.
    pub async fn search_graph_community(&self, index: &str, query: &str) -> Result<String> {
        require(index, "index")?;
        require(query, "query")?;

        let subgraph = match self.assemble_subgraph(index, query).await? {
            Some(s) => s,
            None => return Ok(String::new()),
        };

        let memberships = self.repo.get_memberships(index).await?;
        let member_ids: HashSet<&str> = subgraph.0.iter().map(|n| n.id.as_str()).collect();
        let community_ids: HashSet<&str> = memberships
            .iter()
            .filter(|m| member_ids.contains(m.node_id.as_str()))
            .map(|m| m.community_id.as_str())
            .collect();

        let summaries: Vec<String> = self
            .repo
            .get_communities(index)
            .await?
            .into_iter()
            .filter(|c| community_ids.contains(c.community_id.as_str()))
            .map(|c| c.summaries)
            .collect();
        let global = self.repo.get_global(index).await?.map(|g| g.summaries);

        let extra = serde_json::json!({
            "communitySummaries": summaries,
            "globalSummary": global,
        });
        let json = subgraph_json(&subgraph.0, &subgraph.1, Some(extra));
        self.semantic.answer(&json, query).await
    }

    // -----------------------------------------------------------------
    // Communities and global summary
    // -----------------------------------------------------------------

    /// Wipe and re-detect communities for `index`, then summarize each one.
    pub async fn rebuild_communities(&self, index: &str) -> Result<()> {
        require(index, "index")?;

        self.repo.delete_communities_by_index(index).await?;

        let edges = self.repo.get_edges_by_index(index).await?;
        let labels = detect_communities(&edges);
        if labels.is_empty() {
            info!("No connected nodes in index {}, skipping communities", index);
            return Ok(());
        }

        let memberships: Vec<CommunityMembership> = labels
            .iter()
            .map(|(node_id, community_id)| CommunityMembership {
                index: index.to_string(),
                community_id: community_id.clone(),
                node_id: node_id.clone(),
            })
            .collect();
        self.repo.replace_memberships(index, &memberships).await?;

        let mut members_by_community: HashMap<&str, Vec<&str>> = HashMap::new();
        for (node_id, community_id) in &labels {
            members_by_community
                .entry(community_id.as_str())
                .or_default()
                .push(node_id.as_str());
        }

        for (community_id, member_ids) in members_by_community {
            let ids: Vec<String> = member_ids.iter().map(|s| s.to_string()).collect();
            let mut members = self.repo.get_nodes_by_ids(index, &ids).await?;
            members.sort_by(|a, b| a.name.cmp(&b.name));

            let block: String = members
                .iter()
                .map(|n| format!("Name:{}; Type:{}; Desc:{}", n.name, n.node_type, n.desc))
                .collect::<Vec<_>>()
                .join("\n");
            let summary = self.semantic.summarize_community(&block).await?;

            self.repo
                .add_community(&Community {
                    community_id: community_id.to_string(),
                    index: index.to_string(),
                    summaries: summary,
                })
                .await?;
        }

        info!("Rebuilt communities for index {}", index);
        Ok(())
    }

    /// Regenerate the per-index global summary from the current community
    /// summaries. No-op when no communities exist.
    pub async fn rebuild_global(&self, index: &str) -> Result<()> {
        require(index, "index")?;

        let communities = self.repo.get_communities(index).await?;
        if communities.is_empty() {
            info!("No communities in index {}, skipping global summary", index);
            return Ok(());
        }

        let block: String = communities
            .iter()
            .map(|c| c.summaries.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let summary = self.semantic.summarize_global(&block).await?;

        self.repo
            .upsert_global(&GlobalSummary {
                index: index.to_string(),
                summaries: summary,
            })
            .await
    }

    // -----------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------

    /// Full graph of one index, for visualization.
    pub async fn graph_snapshot(&self, index: &str) -> Result<(Vec<Node>, Vec<Edge>)> {
        require(index, "index")?;
        let nodes = self.repo.get_nodes_by_index(index).await?;
        let edges = self.repo.get_edges_by_index(index).await?;
        Ok((nodes, edges))
    }

    pub async fn list_indices(&self) -> Result<Vec<String>> {
        self.repo.list_indices().await
    }

    /// Remove every vector entry and persisted row for `index`.
    ///
    /// Deletes run globals → communities and memberships → edges → nodes so
    /// referential integrity holds on relational adapters throughout.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        require(index, "index")?;

        let nodes = self.repo.get_nodes_by_index(index).await?;
        for node in &nodes {
            self.vectors.remove(index, &node.id).await?;
        }

        self.repo.delete_global(index).await?;
        self.repo.delete_communities_by_index(index).await?;
        self.repo.delete_edges_by_index(index).await?;
        self.repo.delete_nodes_by_index(index).await?;

        info!("Deleted index {} ({} nodes)", index, nodes.len());
        Ok(())
    }
}
