//! SQLite-backed vector memory with an in-memory cosine search matrix.
//!
//! Records are keyed by `(index, id)`; the payload is the node's
//! `"Name:…;Type:…;Desc:…"` text. Per-index normalized embedding matrices
//! are rebuilt lazily behind a dirty flag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use graphloom_core::{Error, Result};

use crate::embedder::EmbedderBackend;

/// A nearest-neighbour hit. Relevance is in [0,1]; 1.0 is reserved for
/// exact semantic identity.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub relevance: f64,
}

/// Embedding-backed nearest-neighbour memory, scoped by index.
#[async_trait]
pub trait VectorMemory: Send + Sync {
    /// Embed `text` and upsert it under `(index, id)`.
    async fn save(&self, index: &str, id: &str, text: &str) -> Result<()>;

    /// Nearest neighbours of `query` in `index`, descending relevance,
    /// all ≥ `min_relevance`, at most `limit`. Restartable by re-invocation.
    async fn search(
        &self,
        index: &str,
        query: &str,
        limit: usize,
        min_relevance: f64,
    ) -> Result<Vec<VectorHit>>;

    /// Remove the record for `(index, id)`.
    async fn remove(&self, index: &str, id: &str) -> Result<()>;
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS vectors (
    idx TEXT NOT NULL,
    id TEXT NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (idx, id)
);
CREATE INDEX IF NOT EXISTS idx_vectors_idx ON vectors(idx);
";

struct MatrixCache {
    /// Normalized embeddings, shape (N, dim).
    matrix: Array2<f32>,
    /// Record ids corresponding to each row.
    ids: Vec<String>,
    texts: Vec<String>,
    dirty: bool,
}

/// SQLite vector memory with per-index in-memory search matrices.
pub struct SqliteVectorMemory {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedder: Arc<dyn EmbedderBackend>,
    dim: usize,
    matrices: Mutex<HashMap<String, MatrixCache>>,
}

impl SqliteVectorMemory {
    /// Open or create the vector store under `db_dir`.
    pub fn open(db_dir: impl AsRef<Path>, embedder: Arc<dyn EmbedderBackend>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("vectors.db");

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let dim = embedder.dimension();
        info!("Vector memory initialized: dim={}, path={}", dim, db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            embedder,
            dim,
            matrices: Mutex::new(HashMap::new()),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn mark_dirty(&self, index: &str) {
        if let Some(cache) = self.matrices.lock().get_mut(index) {
            cache.dirty = true;
        }
    }

    /// Load and normalize all embeddings of one index into a matrix.
    fn load_matrix(&self, index: &str) -> Result<()> {
        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut embeddings: Vec<Array1<f32>> = Vec::new();

        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare_cached("SELECT id, text, embedding FROM vectors WHERE idx = ?1")
                .map_err(|e| Error::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params![index], |row| {
                    let id: String = row.get(0)?;
                    let text: String = row.get(1)?;
                    let blob: Vec<u8> = row.get(2)?;
                    Ok((id, text, blob))
                })
                .map_err(|e| Error::Database(e.to_string()))?;

            for row in rows {
                let (id, text, blob) = row.map_err(|e| Error::Database(e.to_string()))?;
                ids.push(id);
                texts.push(text);
                embeddings.push(bytes_to_embedding(&blob, self.dim));
            }
        }

        let mut matrix = Array2::zeros((embeddings.len(), self.dim));
        for (i, emb) in embeddings.iter().enumerate() {
            matrix.row_mut(i).assign(emb);
        }
        // Normalize rows for cosine similarity via dot product
        for mut row in matrix.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 1e-9 {
                row /= norm;
            }
        }

        debug!("Loaded {} embeddings for index {}", ids.len(), index);
        self.matrices.lock().insert(
            index.to_string(),
            MatrixCache {
                matrix,
                ids,
                texts,
                dirty: false,
            },
        );
        Ok(())
    }

    fn ensure_matrix(&self, index: &str) -> Result<()> {
        let needs_load = match self.matrices.lock().get(index) {
            Some(cache) => cache.dirty,
            None => true,
        };
        if needs_load {
            self.load_matrix(index)?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorMemory for SqliteVectorMemory {
    async fn save(&self, index: &str, id: &str, text: &str) -> Result<()> {
        let embedding = self.embedder.embed(text).await?;
        let blob = embedding_to_bytes(&embedding);

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT OR REPLACE INTO vectors (idx, id, text, embedding) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![index, id, text, blob])
        .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        self.mark_dirty(index);
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        limit: usize,
        min_relevance: f64,
    ) -> Result<Vec<VectorHit>> {
        let query_embedding = self.embedder.embed(query).await?;
        let q_norm = query_embedding.dot(&query_embedding).sqrt();
        if q_norm < 1e-9 {
            return Ok(Vec::new());
        }
        let q = &query_embedding / q_norm;

        self.ensure_matrix(index)?;

        let matrices = self.matrices.lock();
        let cache = match matrices.get(index) {
            Some(c) if c.matrix.nrows() > 0 => c,
            _ => return Ok(Vec::new()),
        };

        let similarities = cache.matrix.dot(&q);
        let mut hits: Vec<VectorHit> = similarities
            .iter()
            .enumerate()
            .filter_map(|(i, &cos)| {
                let relevance = if (1.0 - cos as f64).abs() < 1e-6 {
                    1.0
                } else {
                    (cos as f64).clamp(0.0, 1.0)
                };
                if relevance >= min_relevance {
                    Some(VectorHit {
                        id: cache.ids[i].clone(),
                        text: cache.texts[i].clone(),
                        relevance,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn remove(&self, index: &str, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM vectors WHERE idx = ?1 AND id = ?2",
            params![index, id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        self.mark_dirty(index);
        Ok(())
    }
}

fn embedding_to_bytes(embedding: &Array1<f32>) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_embedding(blob: &[u8], dim: usize) -> Array1<f32> {
    let mut vector = Array1::zeros(dim);
    for (i, chunk) in blob.chunks_exact(4).take(dim).enumerate() {
        vector[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    vector
}
