//! Chat-completion access with an ordered provider fallback chain.

pub mod client;
pub mod filter;
pub mod openai;
pub mod openrouter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::LlmClient;
pub use filter::filter_thinking_tags;
pub use openai::OpenAiCompatibleProvider;
pub use openrouter::OpenRouterProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Failure of a single provider call
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    BadResponse(String),
}

impl ProviderError {
    /// Worth retrying against the same provider
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::RateLimited | ProviderError::Server { .. }
        )
    }

    /// The provider could not be used at all: no connection, or credentials refused
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ProviderError::Unreachable(_) | ProviderError::Auth { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() || e.is_request() {
            ProviderError::Unreachable(e.to_string())
        } else if e.is_decode() {
            ProviderError::BadResponse(e.to_string())
        } else {
            ProviderError::Unreachable(e.to_string())
        }
    }
}

/// Failure of a whole completion request across the chain
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("no LLM provider configured")]
    NoProviders,

    #[error("all LLM providers failed: {}", summarize(.failures))]
    Exhausted { failures: Vec<(String, ProviderError)> },
}

impl LlmError {
    /// True when every provider was unreachable or refused credentials, which ends
    /// the run. Any provider that answered, even badly, lets the stage degrade instead.
    pub fn is_fatal(&self) -> bool {
        match self {
            LlmError::NoProviders => true,
            LlmError::Exhausted { failures } => {
                failures.iter().all(|(_, error)| error.is_unavailable())
            }
        }
    }
}

fn summarize(failures: &[(String, ProviderError)]) -> String {
    failures
        .iter()
        .map(|(provider, error)| format!("{provider}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One chat-completion backend
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
