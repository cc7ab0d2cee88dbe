//! Persisted graph entities. Everything is scoped by `index`.

use serde::{Deserialize, Serialize};

/// A named, typed, described vertex in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub index: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub desc: String,
}

impl Node {
    /// The text stored in vector memory for this node.
    pub fn desc_text(&self) -> String {
        format!("Name:{};Type:{};Desc:{}", self.name, self.node_type, self.desc)
    }
}

/// A labelled connection between two nodes. Stored with the direction the
/// model authored, treated as undirected for dedup and community detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub index: String,
    pub source: String,
    pub target: String,
    pub relationship: String,
}

impl Edge {
    /// Endpoint pair with ordering ignored, for undirected dedup.
    pub fn unordered_key(&self) -> (String, String) {
        if self.source <= self.target {
            (self.source.clone(), self.target.clone())
        } else {
            (self.target.clone(), self.source.clone())
        }
    }
}

/// One node's assignment to a community of the latest detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityMembership {
    pub index: String,
    pub community_id: String,
    pub node_id: String,
}

/// Summary record for one detected community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub community_id: String,
    pub index: String,
    pub summaries: String,
}

/// The single per-index summary synthesized from all community summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub index: String,
    pub summaries: String,
}
