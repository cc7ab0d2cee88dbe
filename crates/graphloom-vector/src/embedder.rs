//! Embedding backends.
//!
//! `RemoteEmbedder` calls an OpenAI-compatible `/embeddings` endpoint.
//! `HashEmbedder` is a deterministic feature-hash fallback used when no
//! embedding service is configured, and by the test suite.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use ndarray::Array1;

use graphloom_core::{Error, Result};

/// Trait for embedding backends.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Deterministic feature-hash embedder.
///
/// Tokens are hashed into `dim` buckets with a sign bit; the vector is
/// L2-normalized. Identical texts always embed identically, so exact
/// duplicates score relevance 1.0 in the vector memory.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbedderBackend for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let mut vector = Array1::<f32>::zeros(self.dim);
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.dot(&vector).sqrt();
        if norm > 1e-9 {
            vector /= norm;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Embedder backed by a remote OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

impl RemoteEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dim: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: std::env::var("GRAPHLOOM_EMBEDDING_API_KEY").ok(),
            dim,
        }
    }
}

#[async_trait]
impl EmbedderBackend for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "Embedding API returned status {}",
                response.status()
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("Embedding response decode failed: {}", e)))?;

        let values = parsed["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| Error::Vector("Embedding response missing data[0].embedding".into()))?;

        if values.len() != self.dim {
            return Err(Error::Vector(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dim,
                values.len()
            )));
        }

        let vector: Array1<f32> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
