//! Configuration loaded from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which repository backend stores the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DbKind {
    Relational,
    PropertyGraph,
}

impl std::str::FromStr for DbKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relational" | "sqlite" => Ok(DbKind::Relational),
            "propertygraph" | "property-graph" | "neo4j" => Ok(DbKind::PropertyGraph),
            other => Err(Error::Config(format!("Unknown db type: {}", other))),
        }
    }
}

/// Credentials for the property-graph backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Text chunker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum physical lines per line-group.
    pub lines_per_split: usize,
    /// Maximum whitespace tokens per paragraph.
    pub tokens_per_paragraph: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            lines_per_split: 20,
            tokens_per_paragraph: 500,
        }
    }
}

/// Retrieval and subgraph expansion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSearchConfig {
    /// Vector search result limit for the initial retrieval.
    pub search_limit: usize,
    /// Minimum relevance for the initial retrieval.
    pub search_min_relevance: f64,
    /// Maximum BFS depth during subgraph expansion.
    pub node_depth: usize,
    /// Maximum nodes in a returned subgraph.
    pub max_nodes: usize,
    /// Token budget for the subgraph handed to the model.
    pub max_tokens: usize,
}

impl Default for GraphSearchConfig {
    fn default() -> Self {
        Self {
            search_limit: 10,
            search_min_relevance: 0.6,
            node_depth: 3,
            max_nodes: 30,
            max_tokens: 4096,
        }
    }
}

/// Top-level GraphLoom configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLoomConfig {
    /// HTTP server port.
    pub port: u16,
    /// Root data directory.
    pub data_dir: PathBuf,
    /// Graph repository backend.
    pub db_kind: DbKind,
    /// Connection string for the relational backend (a directory path).
    pub db_connection: String,
    /// Connection string for the vector store (a directory path).
    pub vector_connection: String,
    /// Embedding dimension.
    pub vector_size: usize,
    /// Property-graph credentials, required when `db_kind` is `PropertyGraph`.
    pub neo4j: Option<Neo4jConfig>,
    pub chunker: ChunkerConfig,
    pub graph_search: GraphSearchConfig,
    /// LLM configuration file (`llm-config.json`).
    pub llm_config_file: PathBuf,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl GraphLoomConfig {
    /// Create configuration from environment and defaults.
    ///
    /// `GRAPHLOOM_DB_TYPE` selects the backend (`relational` or
    /// `propertyGraph`); the property-graph credentials come from
    /// `GRAPHLOOM_NEO4J_{URI,USER,PASSWORD,DATABASE}`.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let db_kind: DbKind = std::env::var("GRAPHLOOM_DB_TYPE")
            .unwrap_or_else(|_| "relational".into())
            .parse()?;

        let neo4j = match db_kind {
            DbKind::PropertyGraph => Some(Neo4jConfig {
                uri: std::env::var("GRAPHLOOM_NEO4J_URI")
                    .map_err(|_| Error::Config("GRAPHLOOM_NEO4J_URI is required".into()))?,
                user: std::env::var("GRAPHLOOM_NEO4J_USER").unwrap_or_else(|_| "neo4j".into()),
                password: std::env::var("GRAPHLOOM_NEO4J_PASSWORD")
                    .map_err(|_| Error::Config("GRAPHLOOM_NEO4J_PASSWORD is required".into()))?,
                database: std::env::var("GRAPHLOOM_NEO4J_DATABASE")
                    .unwrap_or_else(|_| "neo4j".into()),
            }),
            DbKind::Relational => None,
        };

        let db_connection = std::env::var("GRAPHLOOM_DB_CONNECTION")
            .unwrap_or_else(|_| data_dir.join("graphdb").to_string_lossy().into_owned());
        let vector_connection = std::env::var("GRAPHLOOM_VECTOR_CONNECTION")
            .unwrap_or_else(|_| data_dir.join("vectordb").to_string_lossy().into_owned());

        Ok(Self {
            port: env_parse("PORT", 3009),
            db_kind,
            db_connection,
            vector_connection,
            vector_size: env_parse("GRAPHLOOM_VECTOR_SIZE", 384),
            neo4j,
            chunker: ChunkerConfig {
                lines_per_split: env_parse("GRAPHLOOM_LINES_PER_SPLIT", 20),
                tokens_per_paragraph: env_parse("GRAPHLOOM_TOKENS_PER_PARAGRAPH", 500),
            },
            graph_search: GraphSearchConfig {
                search_limit: env_parse("GRAPHLOOM_SEARCH_LIMIT", 10),
                search_min_relevance: env_parse("GRAPHLOOM_SEARCH_MIN_RELEVANCE", 0.6),
                node_depth: env_parse("GRAPHLOOM_NODE_DEPTH", 3),
                max_nodes: env_parse("GRAPHLOOM_MAX_NODES", 30),
                max_tokens: env_parse("GRAPHLOOM_MAX_TOKENS", 4096),
            },
            llm_config_file: data_dir.join("llm-config.json"),
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_kind_parse() {
        assert_eq!("relational".parse::<DbKind>().unwrap(), DbKind::Relational);
        assert_eq!(
            "propertyGraph".parse::<DbKind>().unwrap(),
            DbKind::PropertyGraph
        );
        assert_eq!("neo4j".parse::<DbKind>().unwrap(), DbKind::PropertyGraph);
        assert!("mongo".parse::<DbKind>().is_err());
    }

    #[test]
    fn test_defaults() {
        let search = GraphSearchConfig::default();
        assert!(search.search_min_relevance > 0.0 && search.search_min_relevance < 1.0);
        assert!(search.max_nodes > 0);
        let chunker = ChunkerConfig::default();
        assert!(chunker.lines_per_split > 0);
    }
}
