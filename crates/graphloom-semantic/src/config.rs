//! Model provider configuration and selection.
//!
//! Settings persist in `llm-config.json`; API keys the file leaves unset
//! fall back to environment variables. Resolution produces a
//! [`ProviderHandle`] carrying everything one completion call needs.

use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Groq,
}

impl ProviderKind {
    /// Selection order when no provider is pinned.
    const AUTO_ORDER: [ProviderKind; 3] = [
        ProviderKind::Anthropic,
        ProviderKind::Groq,
        ProviderKind::OpenAI,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1/chat/completions",
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(ProviderKind::OpenAI),
            "anthropic" => Some(ProviderKind::Anthropic),
            "groq" => Some(ProviderKind::Groq),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Groq => write!(f, "groq"),
        }
    }
}

/// A resolved provider: endpoint selection plus the call parameters.
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: usize,
}

/// Stored model configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> usize {
    2048
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn env_fallback(slot: &mut Option<String>, var: &str) {
    if slot.is_none() {
        *slot = std::env::var(var).ok();
    }
}

impl LlmConfig {
    /// Load config from file, with env-var fallback for unset API keys.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LlmConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        env_fallback(&mut config.openai_api_key, "OPENAI_API_KEY");
        env_fallback(&mut config.anthropic_api_key, "ANTHROPIC_API_KEY");
        env_fallback(&mut config.groq_api_key, "GROQ_API_KEY");

        config
    }

    /// Resolve the provider for the next completion call. A pinned provider
    /// without a key resolves to nothing; auto mode walks the preference
    /// order and takes the first provider with a key.
    pub fn resolve(&self) -> Option<ProviderHandle> {
        if self.preferred_provider != "auto" {
            return ProviderKind::from_name(&self.preferred_provider)
                .and_then(|kind| self.handle_for(kind));
        }
        ProviderKind::AUTO_ORDER
            .iter()
            .find_map(|&kind| self.handle_for(kind))
    }

    fn handle_for(&self, kind: ProviderKind) -> Option<ProviderHandle> {
        let (key, model) = match kind {
            ProviderKind::OpenAI => (self.openai_api_key.as_ref(), &self.openai_model),
            ProviderKind::Anthropic => (self.anthropic_api_key.as_ref(), &self.anthropic_model),
            ProviderKind::Groq => (self.groq_api_key.as_ref(), &self.groq_model),
        };
        key.map(|api_key| ProviderHandle {
            kind,
            model: model.clone(),
            api_key: api_key.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}
