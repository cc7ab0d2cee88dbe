//! Structured payloads exchanged with the language model.

use serde::{Deserialize, Serialize};

/// A node as extracted from one chunk of text.
///
/// `local_id` is only meaningful within the extraction call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedNode {
    #[serde(alias = "localId")]
    pub local_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub desc: String,
}

/// An edge between two locally-identified nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEdge {
    #[serde(alias = "sourceLocalId")]
    pub source_local_id: String,
    #[serde(alias = "targetLocalId")]
    pub target_local_id: String,
    pub relationship: String,
}

/// The structured graph extracted from a text chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<ExtractedNode>,
    #[serde(default)]
    pub edges: Vec<ExtractedEdge>,
}

/// Which of the two judged descriptions is the relation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationSource {
    Node1,
    Node2,
}

/// Model verdict on whether two node descriptions are related.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationJudgement {
    pub related: bool,
    /// `Node1` means the first description is the source.
    #[serde(default = "default_source", alias = "sourceLabel")]
    pub source: RelationSource,
    #[serde(default)]
    pub relationship: String,
}

fn default_source() -> RelationSource {
    RelationSource::Node1
}
