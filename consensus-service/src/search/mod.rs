//! Web search over interchangeable providers with trust ranking, retry, caching
//! and a deterministic offline fallback.

pub mod client;
pub mod domains;
pub mod providers;
pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{ResultOrigin, SearchResponse, WebSearchClient};
pub use domains::TrustedDomains;
pub use providers::{GoogleCustomSearchProvider, SerpApiProvider};

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("search API error (HTTP {status})")]
    Api { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    BadResponse(String),
}

impl SearchError {
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::Timeout | SearchError::RateLimited => true,
            SearchError::Api { status } => *status >= 500,
            SearchError::Network(_) | SearchError::BadResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::BadResponse(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// Provider-neutral hit before trust ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawHit>, SearchError>;
}
