//! GraphLoom Core — configuration, error type, shared result alias.

pub mod config;
pub mod error;

pub use config::{ChunkerConfig, DbKind, GraphLoomConfig, GraphSearchConfig, Neo4jConfig};
pub use error::{Error, Result};
