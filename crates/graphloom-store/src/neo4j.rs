//! Property-graph adapter over Neo4j.
//!
//! Nodes are stored under one label `Node` with an `idx` property; edges are
//! a single relationship type `RELATES_TO`. Edge identity is
//! direction-normalized: the id is a hash of the lexicographically ordered
//! endpoints plus relationship and index, and a `reversed` flag preserves the
//! authored direction. Inserting over an existing undirected edge merges the
//! relationship labels instead of duplicating the edge.

use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Row};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use graphloom_core::config::Neo4jConfig;
use graphloom_core::{Error, Result};

use crate::repository::Repository;
use crate::types::{Community, CommunityMembership, Edge, GlobalSummary, Node};

const MAX_ATTEMPTS: usize = 3;
const BASE_DELAY_MS: u64 = 100;

/// One constraint-creation pass per process, completed before any operation.
static CONSTRAINTS_INIT: OnceCell<()> = OnceCell::const_new();

/// Deterministic edge id from lexicographically ordered endpoints.
/// Returns the id and whether the authored direction was reversed.
pub fn normalized_edge_id(
    index: &str,
    source: &str,
    target: &str,
    relationship: &str,
) -> (String, bool) {
    let reversed = source > target;
    let (lo, hi) = if reversed {
        (target, source)
    } else {
        (source, target)
    };
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}|{}", lo, hi, relationship, index).as_bytes());
    (hex::encode(hasher.finalize()), reversed)
}

/// Merge two `;`-tokenized relationship labels, keeping first-seen order.
pub fn merge_relationship_labels(existing: &str, incoming: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for raw in existing.split(';').chain(incoming.split(';')) {
        let part = raw.trim();
        if !part.is_empty() && !parts.iter().any(|p| p == part) {
            parts.push(part.to_string());
        }
    }
    parts.join("; ")
}

/// Neo4j-backed graph repository.
pub struct Neo4jRepository {
    graph: Graph,
}

impl Neo4jRepository {
    /// Connect and run the once-per-process constraint setup.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let graph_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .build()
            .map_err(|e| Error::Config(format!("Neo4j config: {}", e)))?;

        let graph = Graph::connect(graph_config)
            .await
            .map_err(|e| Error::Database(format!("Neo4j connect: {}", e)))?;

        let repo = Self { graph };

        CONSTRAINTS_INIT
            .get_or_try_init(|| async {
                repo.create_constraints().await?;
                info!("Neo4j constraints ensured");
                Ok::<_, Error>(())
            })
            .await?;

        Ok(repo)
    }

    async fn create_constraints(&self) -> Result<()> {
        self.run_with_retry(|| {
            query(
                "CREATE CONSTRAINT graphloom_node_id IF NOT EXISTS \
                 FOR (n:Node) REQUIRE n.id IS UNIQUE",
            )
        })
        .await?;
        self.run_with_retry(|| {
            query("CREATE INDEX graphloom_node_idx IF NOT EXISTS FOR (n:Node) ON (n.idx)")
        })
        .await
    }

    /// Run a write query, retrying transient failures with doubling delay.
    async fn run_with_retry<F>(&self, build: F) -> Result<()>
    where
        F: Fn() -> neo4rs::Query + Send + Sync,
    {
        let mut delay = Duration::from_millis(BASE_DELAY_MS);
        for attempt in 1..=MAX_ATTEMPTS {
            match self.graph.run(build()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!("Neo4j write failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(Error::Database(e.to_string())),
            }
        }
        unreachable!("retry loop always returns")
    }

    /// Execute a read query and collect all rows, with the same retry policy.
    async fn rows_with_retry<F>(&self, build: F) -> Result<Vec<Row>>
    where
        F: Fn() -> neo4rs::Query + Send + Sync,
    {
        let mut delay = Duration::from_millis(BASE_DELAY_MS);
        for attempt in 1..=MAX_ATTEMPTS {
            let collected = async {
                let mut stream = self.graph.execute(build()).await?;
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await? {
                    rows.push(row);
                }
                Ok::<_, neo4rs::Error>(rows)
            }
            .await;

            match collected {
                Ok(rows) => return Ok(rows),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!("Neo4j read failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(Error::Database(e.to_string())),
            }
        }
        unreachable!("retry loop always returns")
    }

    fn row_to_node(row: &Row, index: &str) -> Node {
        Node {
            id: row.get::<String>("id").unwrap_or_default(),
            index: index.to_string(),
            name: row.get::<String>("name").unwrap_or_default(),
            node_type: row.get::<String>("type").unwrap_or_default(),
            desc: row.get::<String>("desc").unwrap_or_default(),
        }
    }

    /// Reconstruct the logical edge from a physically lo→hi stored row.
    fn row_to_edge(row: &Row, index: &str) -> Edge {
        let src = row.get::<String>("src").unwrap_or_default();
        let dst = row.get::<String>("dst").unwrap_or_default();
        let reversed = row.get::<bool>("reversed").unwrap_or(false);
        let (source, target) = if reversed { (dst, src) } else { (src, dst) };
        Edge {
            id: row.get::<String>("id").unwrap_or_default(),
            index: index.to_string(),
            source,
            target,
            relationship: row.get::<String>("relationship").unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Repository for Neo4jRepository {
    async fn list_indices(&self) -> Result<Vec<String>> {
        let rows = self
            .rows_with_retry(|| query("MATCH (n:Node) RETURN DISTINCT n.idx AS idx ORDER BY idx"))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<String>("idx").ok())
            .collect())
    }

    async fn add_node(&self, node: &Node) -> Result<()> {
        self.run_with_retry(|| {
            query(
                "CREATE (n:Node {id: $id, idx: $idx, name: $name, type: $type, desc: $desc})",
            )
            .param("id", node.id.as_str())
            .param("idx", node.index.as_str())
            .param("name", node.name.as_str())
            .param("type", node.node_type.as_str())
            .param("desc", node.desc.as_str())
        })
        .await
    }

    async fn update_node_desc(&self, index: &str, id: &str, desc: &str) -> Result<()> {
        let rows = self
            .rows_with_retry(|| {
                query("MATCH (n:Node {id: $id, idx: $idx}) SET n.desc = $desc RETURN n.id AS id")
                    .param("id", id)
                    .param("idx", index)
                    .param("desc", desc)
            })
            .await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("Node {} in index {}", id, index)));
        }
        Ok(())
    }

    async fn get_node(&self, index: &str, id: &str) -> Result<Option<Node>> {
        let rows = self
            .rows_with_retry(|| {
                query(
                    "MATCH (n:Node {id: $id, idx: $idx}) \
                     RETURN n.id AS id, n.name AS name, n.type AS type, n.desc AS desc",
                )
                .param("id", id)
                .param("idx", index)
            })
            .await?;
        Ok(rows.first().map(|row| Self::row_to_node(row, index)))
    }

    async fn get_nodes_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<Node>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        let rows = self
            .rows_with_retry(move || {
                query(
                    "MATCH (n:Node {idx: $idx}) WHERE n.id IN $ids \
                     RETURN n.id AS id, n.name AS name, n.type AS type, n.desc AS desc",
                )
                .param("idx", index)
                .param("ids", ids.clone())
            })
            .await?;
        Ok(rows.iter().map(|row| Self::row_to_node(row, index)).collect())
    }

    async fn get_nodes_by_index(&self, index: &str) -> Result<Vec<Node>> {
        let rows = self
            .rows_with_retry(|| {
                query(
                    "MATCH (n:Node {idx: $idx}) \
                     RETURN n.id AS id, n.name AS name, n.type AS type, n.desc AS desc \
                     ORDER BY n.name",
                )
                .param("idx", index)
            })
            .await?;
        Ok(rows.iter().map(|row| Self::row_to_node(row, index)).collect())
    }

    async fn delete_nodes_by_index(&self, index: &str) -> Result<()> {
        self.run_with_retry(|| {
            query("MATCH (n:Node {idx: $idx}) DETACH DELETE n").param("idx", index)
        })
        .await
    }

    async fn add_edge(&self, edge: &Edge) -> Result<()> {
        if edge.source == edge.target {
            return Err(Error::Integrity(format!(
                "Self-loop rejected on node {}",
                edge.source
            )));
        }

        let rows = self
            .rows_with_retry(|| {
                query("MATCH (n:Node {idx: $idx}) WHERE n.id IN [$a, $b] RETURN count(n) AS c")
                    .param("idx", edge.index.as_str())
                    .param("a", edge.source.as_str())
                    .param("b", edge.target.as_str())
            })
            .await?;
        let count = rows
            .first()
            .and_then(|row| row.get::<i64>("c").ok())
            .unwrap_or(0);
        if count != 2 {
            return Err(Error::Integrity(format!(
                "Edge {} -> {} references a missing node in index {}",
                edge.source, edge.target, edge.index
            )));
        }

        // Merge into an existing undirected edge rather than duplicating it.
        if let Some(existing) = self
            .get_edge_between(&edge.index, &edge.source, &edge.target)
            .await?
        {
            let merged = merge_relationship_labels(&existing.relationship, &edge.relationship);
            return self
                .update_edge_relationship(&edge.index, &existing.id, &merged)
                .await;
        }

        let (edge_id, reversed) =
            normalized_edge_id(&edge.index, &edge.source, &edge.target, &edge.relationship);
        let (lo, hi) = if reversed {
            (edge.target.as_str(), edge.source.as_str())
        } else {
            (edge.source.as_str(), edge.target.as_str())
        };

        self.run_with_retry(|| {
            query(
                "MATCH (lo:Node {id: $lo, idx: $idx}), (hi:Node {id: $hi, idx: $idx}) \
                 CREATE (lo)-[:RELATES_TO {id: $id, idx: $idx, relationship: $rel, \
                 reversed: $reversed}]->(hi)",
            )
            .param("lo", lo)
            .param("hi", hi)
            .param("idx", edge.index.as_str())
            .param("id", edge_id.as_str())
            .param("rel", edge.relationship.as_str())
            .param("reversed", reversed)
        })
        .await
    }

    async fn update_edge_relationship(
        &self,
        index: &str,
        id: &str,
        relationship: &str,
    ) -> Result<()> {
        self.run_with_retry(|| {
            query("MATCH ()-[r:RELATES_TO {id: $id, idx: $idx}]->() SET r.relationship = $rel")
                .param("id", id)
                .param("idx", index)
                .param("rel", relationship)
        })
        .await
    }

    async fn delete_edge(&self, index: &str, id: &str) -> Result<()> {
        self.run_with_retry(|| {
            query("MATCH ()-[r:RELATES_TO {id: $id, idx: $idx}]->() DELETE r")
                .param("id", id)
                .param("idx", index)
        })
        .await
    }

    async fn get_edge_between(&self, index: &str, a: &str, b: &str) -> Result<Option<Edge>> {
        let rows = self
            .rows_with_retry(|| {
                query(
                    "MATCH (x:Node {idx: $idx})-[r:RELATES_TO]->(y:Node {idx: $idx}) \
                     WHERE (x.id = $a AND y.id = $b) OR (x.id = $b AND y.id = $a) \
                     RETURN x.id AS src, y.id AS dst, r.id AS id, \
                            r.relationship AS relationship, r.reversed AS reversed \
                     LIMIT 1",
                )
                .param("idx", index)
                .param("a", a)
                .param("b", b)
            })
            .await?;
        Ok(rows.first().map(|row| Self::row_to_edge(row, index)))
    }

    async fn get_edges_by_index(&self, index: &str) -> Result<Vec<Edge>> {
        let rows = self
            .rows_with_retry(|| {
                query(
                    "MATCH (x:Node)-[r:RELATES_TO {idx: $idx}]->(y:Node) \
                     RETURN x.id AS src, y.id AS dst, r.id AS id, \
                            r.relationship AS relationship, r.reversed AS reversed",
                )
                .param("idx", index)
            })
            .await?;
        Ok(rows.iter().map(|row| Self::row_to_edge(row, index)).collect())
    }

    async fn get_edges_by_node_ids(&self, index: &str, ids: &[String]) -> Result<Vec<Edge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        let rows = self
            .rows_with_retry(move || {
                query(
                    "MATCH (x:Node)-[r:RELATES_TO {idx: $idx}]->(y:Node) \
                     WHERE x.id IN $ids AND y.id IN $ids \
                     RETURN x.id AS src, y.id AS dst, r.id AS id, \
                            r.relationship AS relationship, r.reversed AS reversed",
                )
                .param("idx", index)
                .param("ids", ids.clone())
            })
            .await?;
        Ok(rows.iter().map(|row| Self::row_to_edge(row, index)).collect())
    }

    async fn delete_edges_by_index(&self, index: &str) -> Result<()> {
        self.run_with_retry(|| {
            query("MATCH ()-[r:RELATES_TO {idx: $idx}]->() DELETE r").param("idx", index)
        })
        .await
    }

    async fn replace_memberships(
        &self,
        index: &str,
        memberships: &[CommunityMembership],
    ) -> Result<()> {
        self.run_with_retry(|| {
            query("MATCH (m:CommunityNode {idx: $idx}) DELETE m").param("idx", index)
        })
        .await?;
        for m in memberships {
            self.run_with_retry(|| {
                query(
                    "CREATE (:CommunityNode {idx: $idx, community_id: $cid, node_id: $nid})",
                )
                .param("idx", m.index.as_str())
                .param("cid", m.community_id.as_str())
                .param("nid", m.node_id.as_str())
            })
            .await?;
        }
        Ok(())
    }

    async fn get_memberships(&self, index: &str) -> Result<Vec<CommunityMembership>> {
        let rows = self
            .rows_with_retry(|| {
                query(
                    "MATCH (m:CommunityNode {idx: $idx}) \
                     RETURN m.community_id AS community_id, m.node_id AS node_id",
                )
                .param("idx", index)
            })
            .await?;
        Ok(rows
            .iter()
            .map(|row| CommunityMembership {
                index: index.to_string(),
                community_id: row.get::<String>("community_id").unwrap_or_default(),
                node_id: row.get::<String>("node_id").unwrap_or_default(),
            })
            .collect())
    }

    async fn add_community(&self, community: &Community) -> Result<()> {
        self.run_with_retry(|| {
            query(
                "MERGE (c:Community {community_id: $cid, idx: $idx}) SET c.summaries = $summaries",
            )
            .param("cid", community.community_id.as_str())
            .param("idx", community.index.as_str())
            .param("summaries", community.summaries.as_str())
        })
        .await
    }

    async fn get_communities(&self, index: &str) -> Result<Vec<Community>> {
        let rows = self
            .rows_with_retry(|| {
                query(
                    "MATCH (c:Community {idx: $idx}) \
                     RETURN c.community_id AS community_id, c.summaries AS summaries \
                     ORDER BY c.community_id",
                )
                .param("idx", index)
            })
            .await?;
        Ok(rows
            .iter()
            .map(|row| Community {
                community_id: row.get::<String>("community_id").unwrap_or_default(),
                index: index.to_string(),
                summaries: row.get::<String>("summaries").unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_communities_by_index(&self, index: &str) -> Result<()> {
        self.run_with_retry(|| {
            query("MATCH (c:Community {idx: $idx}) DELETE c").param("idx", index)
        })
        .await?;
        self.run_with_retry(|| {
            query("MATCH (m:CommunityNode {idx: $idx}) DELETE m").param("idx", index)
        })
        .await
    }

    async fn upsert_global(&self, global: &GlobalSummary) -> Result<()> {
        self.run_with_retry(|| {
            query("MERGE (g:Global {idx: $idx}) SET g.summaries = $summaries")
                .param("idx", global.index.as_str())
                .param("summaries", global.summaries.as_str())
        })
        .await
    }

    async fn get_global(&self, index: &str) -> Result<Option<GlobalSummary>> {
        let rows = self
            .rows_with_retry(|| {
                query("MATCH (g:Global {idx: $idx}) RETURN g.summaries AS summaries")
                    .param("idx", index)
            })
            .await?;
        Ok(rows.first().map(|row| GlobalSummary {
            index: index.to_string(),
            summaries: row.get::<String>("summaries").unwrap_or_default(),
        }))
    }

    async fn delete_global(&self, index: &str) -> Result<()> {
        self.run_with_retry(|| query("MATCH (g:Global {idx: $idx}) DELETE g").param("idx", index))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_id_is_direction_normalized() {
        let (forward, rev_fwd) = normalized_edge_id("a", "n1", "n2", "knows");
        let (backward, rev_bwd) = normalized_edge_id("a", "n2", "n1", "knows");
        assert_eq!(forward, backward);
        assert!(!rev_fwd);
        assert!(rev_bwd);
    }

    #[test]
    fn test_edge_id_varies_by_index_and_label() {
        let (base, _) = normalized_edge_id("a", "n1", "n2", "knows");
        let (other_index, _) = normalized_edge_id("b", "n1", "n2", "knows");
        let (other_label, _) = normalized_edge_id("a", "n1", "n2", "employs");
        assert_ne!(base, other_index);
        assert_ne!(base, other_label);
    }

    #[test]
    fn test_merge_labels_unions_parts() {
        let merged = merge_relationship_labels("knows; works with", "works with; mentors");
        assert_eq!(merged, "knows; works with; mentors");
    }

    #[test]
    fn test_merge_labels_keeps_new_information() {
        let merged = merge_relationship_labels("knows", "married to");
        assert!(merged.contains("knows"));
        assert!(merged.contains("married to"));
    }

    #[test]
    fn test_merge_labels_handles_empty_existing() {
        assert_eq!(merge_relationship_labels("", "knows"), "knows");
        assert_eq!(merge_relationship_labels("knows", ""), "knows");
    }
}
