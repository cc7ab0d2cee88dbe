//! The `SemanticClient` trait and its LLM-backed implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use parking_lot::RwLock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio_stream::StreamExt;
use tracing::debug;

use graphloom_core::{Error, Result};

use crate::config::{LlmConfig, ProviderHandle};
use crate::prompts;
use crate::providers::{self, CompletionEvent, CompletionRequest};
use crate::types::{GraphPayload, RelationJudgement};

/// Streamed answer fragments. Restartable by re-invoking `answer_stream`.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Language-model capabilities the graph engine depends on.
#[async_trait]
pub trait SemanticClient: Send + Sync {
    /// Extract a typed graph from a chunk of text.
    async fn extract_graph(&self, text: &str) -> Result<GraphPayload>;

    /// Merge two descriptions of the same entity. An empty result tells the
    /// caller to fall back to a deterministic join.
    async fn merge_descriptions(&self, a: &str, b: &str) -> Result<String>;

    /// Judge whether two described entities are related, and in which direction.
    async fn infer_relation(&self, desc_a: &str, desc_b: &str) -> Result<RelationJudgement>;

    /// Summarize the concatenated member descriptions of one community.
    async fn summarize_community(&self, member_block: &str) -> Result<String>;

    /// Summarize the concatenated community summaries of one index.
    async fn summarize_global(&self, community_block: &str) -> Result<String>;

    /// Answer a question given a subgraph rendered as JSON.
    async fn answer(&self, subgraph_json: &str, question: &str) -> Result<String>;

    /// Streaming variant of [`answer`](Self::answer).
    fn answer_stream(&self, subgraph_json: &str, question: &str) -> AnswerStream;
}

/// Strip markdown fences and surrounding prose, then parse the first JSON object.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let without_fences = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str(without_fences) {
        return Ok(value);
    }

    // Model wrapped the object in prose; parse the outermost braces.
    let start = without_fences
        .find('{')
        .ok_or_else(|| Error::Semantic(format!("No JSON object in response: {}", raw)))?;
    let end = without_fences
        .rfind('}')
        .ok_or_else(|| Error::Semantic(format!("Unterminated JSON in response: {}", raw)))?;
    serde_json::from_str(&without_fences[start..=end])
        .map_err(|e| Error::Semantic(format!("Malformed JSON response: {}", e)))
}

/// `SemanticClient` backed by an external streaming completion provider.
pub struct LlmSemanticClient {
    client: Client,
    config: RwLock<LlmConfig>,
}

impl LlmSemanticClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config: RwLock::new(config),
        }
    }

    fn resolve(&self) -> Result<ProviderHandle> {
        self.config
            .read()
            .resolve()
            .ok_or_else(|| Error::Config("No LLM provider configured".into()))
    }

    /// Run one completion and collect the streamed fragments.
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let handle = self.resolve()?;
        debug!("Completing with {} / {}", handle.kind, handle.model);

        let stream = providers::stream_completion(&self.client, &handle, &request);
        tokio::pin!(stream);

        let mut full = String::new();
        while let Some(event) = stream.next().await {
            match event {
                CompletionEvent::Fragment(text) => full.push_str(&text),
                CompletionEvent::Done => break,
                CompletionEvent::Failed(e) => return Err(Error::Semantic(e)),
            }
        }
        Ok(full)
    }
}

#[async_trait]
impl SemanticClient for LlmSemanticClient {
    async fn extract_graph(&self, text: &str) -> Result<GraphPayload> {
        let raw = self.complete(prompts::extract_graph(text)).await?;
        parse_json_response(&raw)
    }

    async fn merge_descriptions(&self, a: &str, b: &str) -> Result<String> {
        let merged = self.complete(prompts::merge_descriptions(a, b)).await?;
        Ok(merged.trim().to_string())
    }

    async fn infer_relation(&self, desc_a: &str, desc_b: &str) -> Result<RelationJudgement> {
        let raw = self.complete(prompts::infer_relation(desc_a, desc_b)).await?;
        parse_json_response(&raw)
    }

    async fn summarize_community(&self, member_block: &str) -> Result<String> {
        let summary = self
            .complete(prompts::summarize_community(member_block))
            .await?;
        Ok(summary.trim().to_string())
    }

    async fn summarize_global(&self, community_block: &str) -> Result<String> {
        let summary = self
            .complete(prompts::summarize_global(community_block))
            .await?;
        Ok(summary.trim().to_string())
    }

    async fn answer(&self, subgraph_json: &str, question: &str) -> Result<String> {
        let answer = self
            .complete(prompts::answer(subgraph_json, question))
            .await?;
        Ok(answer.trim().to_string())
    }

    fn answer_stream(&self, subgraph_json: &str, question: &str) -> AnswerStream {
        let resolved = self.resolve();
        let request = prompts::answer(subgraph_json, question);
        let client = self.client.clone();

        Box::pin(async_stream::stream! {
            let handle = match resolved {
                Ok(h) => h,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let inner = providers::stream_completion(&client, &handle, &request);
            tokio::pin!(inner);

            while let Some(event) = inner.next().await {
                match event {
                    CompletionEvent::Fragment(text) => yield Ok(text),
                    CompletionEvent::Done => return,
                    CompletionEvent::Failed(e) => {
                        yield Err(Error::Semantic(e));
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json() {
        let payload: GraphPayload =
            parse_json_response(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(payload.nodes.is_empty());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"related\": true, \"source\": \"node2\", \"relationship\": \"lives in\"}\n```";
        let j: RelationJudgement = parse_json_response(raw).unwrap();
        assert!(j.related);
    }

    #[test]
    fn test_parse_json_with_prose() {
        let raw = "Here is the result:\n{\"related\": false}\nHope that helps.";
        let j: RelationJudgement = parse_json_response(raw).unwrap();
        assert!(!j.related);
    }

    #[test]
    fn test_parse_garbage_is_semantic_error() {
        let err = parse_json_response::<GraphPayload>("no json here").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
    }
}
