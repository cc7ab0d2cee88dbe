//! Streaming completion transport for the external model providers.
//!
//! Every graph operation is one instruction + input exchange: extract this
//! chunk, merge these two descriptions, answer over this subgraph. The
//! transport sends a single request shaped for the resolved provider and
//! yields answer fragments parsed from its SSE wire format. OpenAI and Groq
//! share a format; Anthropic has its own event vocabulary.

use std::pin::Pin;

use futures::Stream;
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::config::{ProviderHandle, ProviderKind};

/// One instruction + input exchange with the model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// What the model is asked to do with the input.
    pub instruction: String,
    /// The material: a text chunk, two descriptions, a subgraph as JSON.
    pub input: String,
}

impl CompletionRequest {
    pub fn new(instruction: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            input: input.into(),
        }
    }
}

/// A parsed event from the completion stream.
pub enum CompletionEvent {
    Fragment(String),
    Done,
    Failed(String),
}

/// Boxed fragment stream for one completion call.
pub type CompletionStream = Pin<Box<dyn Stream<Item = CompletionEvent> + Send>>;

/// Accumulates SSE bytes and hands out complete `data:` payloads.
/// Comment and `event:` lines are skipped; partial lines wait for more bytes.
struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
    }

    fn next_data(&mut self) -> Option<String> {
        while let Some(end) = self.buffer.find('\n') {
            let line = self.buffer[..end].trim().to_string();
            self.buffer.drain(..=end);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data: ") {
                return Some(data.trim().to_string());
            }
        }
        None
    }
}

/// What one `data:` payload means for the fragment stream.
#[derive(Debug, PartialEq)]
enum SseSignal {
    Fragment(String),
    Done,
    Failed(String),
    Ignore,
}

fn parse_openai_data(data: &str) -> SseSignal {
    if data == "[DONE]" {
        return SseSignal::Done;
    }
    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return SseSignal::Ignore,
    };
    match parsed["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => SseSignal::Fragment(text.to_string()),
        _ => SseSignal::Ignore,
    }
}

fn parse_anthropic_data(data: &str) -> SseSignal {
    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return SseSignal::Ignore,
    };
    match parsed["type"].as_str() {
        Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => SseSignal::Fragment(text.to_string()),
            _ => SseSignal::Ignore,
        },
        Some("message_stop") => SseSignal::Done,
        Some("error") => SseSignal::Failed(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        ),
        _ => SseSignal::Ignore,
    }
}

/// The instruction rides as the system prompt on OpenAI-compatible APIs and
/// as the top-level `system` field on Anthropic; the input is the sole user
/// message either way.
fn request_body(handle: &ProviderHandle, request: &CompletionRequest) -> serde_json::Value {
    match handle.kind {
        ProviderKind::OpenAI | ProviderKind::Groq => json!({
            "model": handle.model,
            "messages": [
                {"role": "system", "content": request.instruction},
                {"role": "user", "content": request.input},
            ],
            "temperature": handle.temperature,
            "max_tokens": handle.max_tokens,
            "stream": true,
        }),
        ProviderKind::Anthropic => json!({
            "model": handle.model,
            "system": request.instruction,
            "messages": [{"role": "user", "content": request.input}],
            "temperature": handle.temperature,
            "max_tokens": handle.max_tokens,
            "stream": true,
        }),
    }
}

/// Stream the fragments of one completion call.
pub fn stream_completion(
    client: &Client,
    handle: &ProviderHandle,
    request: &CompletionRequest,
) -> CompletionStream {
    let client = client.clone();
    let handle = handle.clone();
    let body = request_body(&handle, request);

    Box::pin(async_stream::stream! {
        debug!("Streaming completion from {} ({})", handle.kind, handle.model);

        let builder = client.post(handle.kind.endpoint()).json(&body);
        let builder = match handle.kind {
            ProviderKind::Anthropic => builder
                .header("x-api-key", &handle.api_key)
                .header("anthropic-version", "2023-06-01"),
            ProviderKind::OpenAI | ProviderKind::Groq => {
                builder.header("Authorization", format!("Bearer {}", handle.api_key))
            }
        };

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                yield CompletionEvent::Failed(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield CompletionEvent::Failed(format!("API error {}: {}", status, body));
            return;
        }

        let mut bytes = response.bytes_stream();
        let mut lines = SseLineBuffer::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield CompletionEvent::Failed(format!("Stream read error: {}", e));
                    return;
                }
            };
            lines.push(&chunk);

            while let Some(data) = lines.next_data() {
                let signal = match handle.kind {
                    ProviderKind::Anthropic => parse_anthropic_data(&data),
                    ProviderKind::OpenAI | ProviderKind::Groq => parse_openai_data(&data),
                };
                match signal {
                    SseSignal::Fragment(text) => yield CompletionEvent::Fragment(text),
                    SseSignal::Done => {
                        yield CompletionEvent::Done;
                        return;
                    }
                    SseSignal::Failed(e) => {
                        yield CompletionEvent::Failed(e);
                        return;
                    }
                    SseSignal::Ignore => {}
                }
            }
        }

        yield CompletionEvent::Done;
    })
}
