//! GraphLoom — GraphRAG retrieval server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use graphloom_core::{DbKind, GraphLoomConfig};
use graphloom_engine::GraphEngine;
use graphloom_semantic::{LlmConfig, LlmSemanticClient};
use graphloom_store::{Neo4jRepository, Repository, SqliteRepository};
use graphloom_vector::{EmbedderBackend, HashEmbedder, RemoteEmbedder, SqliteVectorMemory};
use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("GRAPHLOOM_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn create_embedder(dim: usize) -> Arc<dyn EmbedderBackend> {
    match std::env::var("GRAPHLOOM_EMBEDDING_ENDPOINT") {
        Ok(endpoint) => {
            let model = std::env::var("GRAPHLOOM_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".into());
            info!("Using remote embedder at {} ({})", endpoint, model);
            Arc::new(RemoteEmbedder::new(endpoint, model, dim))
        }
        Err(_) => {
            info!("No embedding endpoint configured, using hash embedder");
            Arc::new(HashEmbedder::new(dim))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = GraphLoomConfig::from_env(&data_dir)?;
    let port = config.port;

    // Graph repository
    let repo: Arc<dyn Repository> = match config.db_kind {
        DbKind::Relational => Arc::new(
            SqliteRepository::open(&config.db_connection)
                .map_err(|e| anyhow::anyhow!("Failed to open graph store: {}", e))?,
        ),
        DbKind::PropertyGraph => {
            let neo4j = config
                .neo4j
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Property-graph backend needs credentials"))?;
            Arc::new(
                Neo4jRepository::connect(neo4j)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to connect to Neo4j: {}", e))?,
            )
        }
    };

    // Vector memory
    let embedder = create_embedder(config.vector_size);
    let vectors = Arc::new(
        SqliteVectorMemory::open(&config.vector_connection, embedder)
            .map_err(|e| anyhow::anyhow!("Failed to open vector store: {}", e))?,
    );

    // Semantic client
    let llm_config = LlmConfig::load(&config.llm_config_file);
    let semantic = Arc::new(LlmSemanticClient::new(llm_config));

    // Engine
    let engine = Arc::new(GraphEngine::new(
        repo,
        vectors,
        semantic,
        &config.chunker,
        config.graph_search.clone(),
    ));

    let state = Arc::new(AppState::new(config, engine));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("GraphLoom server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
