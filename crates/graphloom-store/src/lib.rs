//! GraphLoom Store — index-scoped graph persistence behind one contract.
//!
//! Two adapters: a relational SQLite backend and a Neo4j property-graph
//! backend with direction-normalized edge identity.

pub mod neo4j;
pub mod repository;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use neo4j::Neo4jRepository;
pub use repository::Repository;
pub use sqlite::SqliteRepository;
pub use types::*;
