//! The index-scoped persistence contract both adapters satisfy.
//!
//! Write-time integrity: `add_edge` rejects self-loops and edges whose
//! endpoints do not both exist in the same index.

use async_trait::async_trait;

use graphloom_core::Result;

use crate::types::{Community, CommunityMembership, Edge, GlobalSummary, Node};

#[async_trait]
pub trait Repository: Send + Sync {
    /// Distinct indices with at least one node.
    async fn list_indices(&self) -> Result<Vec<String>>;

    // --- nodes ---

    async fn add_node(&self, node: &Node) -> Result<()>;
    async fn update_node_desc(&self, index: &str, id: &str, desc: &str) -> Result<()>;
    async fn get_node(&self, index: &str, id: &str) -> Result<Option<Node>>;
    async fn get_nodes_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<Node>>;
    async fn get_nodes_by_index(&self, index: &str) -> Result<Vec<Node>>;
    async fn delete_nodes_by_index(&self, index: &str) -> Result<()>;

    // --- edges ---

    async fn add_edge(&self, edge: &Edge) -> Result<()>;
    async fn update_edge_relationship(
        &self,
        index: &str,
        id: &str,
        relationship: &str,
    ) -> Result<()>;
    async fn delete_edge(&self, index: &str, id: &str) -> Result<()>;
    /// The edge between `a` and `b` in either direction, if one exists.
    async fn get_edge_between(&self, index: &str, a: &str, b: &str) -> Result<Option<Edge>>;
    async fn get_edges_by_index(&self, index: &str) -> Result<Vec<Edge>>;
    /// Edges with **both** endpoints in `ids`.
    async fn get_edges_by_node_ids(&self, index: &str, ids: &[String]) -> Result<Vec<Edge>>;
    async fn delete_edges_by_index(&self, index: &str) -> Result<()>;

    // --- communities ---

    /// Wipe and replace all memberships for `index`.
    async fn replace_memberships(
        &self,
        index: &str,
        memberships: &[CommunityMembership],
    ) -> Result<()>;
    async fn get_memberships(&self, index: &str) -> Result<Vec<CommunityMembership>>;
    async fn add_community(&self, community: &Community) -> Result<()>;
    async fn get_communities(&self, index: &str) -> Result<Vec<Community>>;
    /// Delete all community summaries and memberships for `index`.
    async fn delete_communities_by_index(&self, index: &str) -> Result<()>;

    // --- global summary ---

    async fn upsert_global(&self, global: &GlobalSummary) -> Result<()>;
    async fn get_global(&self, index: &str) -> Result<Option<GlobalSummary>>;
    async fn delete_global(&self, index: &str) -> Result<()>;
}
