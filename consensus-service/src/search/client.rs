use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    GoogleCustomSearchProvider, RawHit, SearchError, SearchProvider, SerpApiProvider,
    TrustedDomains, simulated,
};
use crate::{config::SearchSettings, models::SearchResult, retry::RetryPolicy};

/// Where a response came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultOrigin {
    Live { provider: String },
    Cache,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub origin: ResultOrigin,
}

pub struct WebSearchClient {
    providers: Vec<Arc<dyn SearchProvider>>,
    retry: RetryPolicy,
    trusted: TrustedDomains,
    cache: DashMap<String, Vec<SearchResult>>,
}

/// Cache key: trimmed, lower-cased, single-spaced
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl WebSearchClient {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        retry: RetryPolicy,
        trusted: TrustedDomains,
    ) -> Self {
        Self {
            providers,
            retry,
            trusted,
            cache: DashMap::new(),
        }
    }

    pub fn from_settings(http: Client, settings: &SearchSettings) -> Self {
        let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
        if let Some(key) = &settings.serpapi_key {
            providers.push(Arc::new(SerpApiProvider::new(
                http.clone(),
                key.clone(),
                settings.request_timeout,
            )));
        }
        if let Some(google) = &settings.google {
            providers.push(Arc::new(GoogleCustomSearchProvider::new(
                http,
                google,
                settings.request_timeout,
            )));
        }
        Self::new(
            providers,
            settings.retry,
            TrustedDomains::new(settings.trusted_domains.clone()),
        )
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        self.search_detailed(query, max_results).await.results
    }

    /// Never fails and never returns an empty list: when every provider errors or comes
    /// back empty, the simulated set is returned.
    pub async fn search_detailed(&self, query: &str, max_results: usize) -> SearchResponse {
        let key = normalize_query(query);
        let max_results = max_results.max(1);

        if let Some(cached) = self.cache.get(&key) {
            debug!(query = %key, "Search cache hit");
            return SearchResponse {
                results: cached.iter().take(max_results).cloned().collect(),
                origin: ResultOrigin::Cache,
            };
        }

        for provider in &self.providers {
            match self.call_with_retry(provider.as_ref(), query, max_results).await {
                Ok(hits) if !hits.is_empty() => {
                    let ranked = self.rank(hits);
                    info!(
                        provider = %provider.name(),
                        results = ranked.len(),
                        trusted = ranked.iter().filter(|r| r.trusted).count(),
                        "Live search succeeded"
                    );
                    self.cache.insert(key, ranked.clone());
                    return SearchResponse {
                        results: ranked.into_iter().take(max_results).collect(),
                        origin: ResultOrigin::Live {
                            provider: provider.name().to_string(),
                        },
                    };
                }
                Ok(_) => warn!(provider = %provider.name(), "Search returned no results"),
                Err(error) => warn!(provider = %provider.name(), error = %error, "Search failed"),
            }
        }

        info!(query = %key, "Using simulated search results");
        SearchResponse {
            results: self.simulated(query, max_results),
            origin: ResultOrigin::Simulated,
        }
    }

    /// Deterministic offline results, already trust-flagged
    pub fn simulated(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        self.rank(simulated::results_for(query))
            .into_iter()
            .take(max_results.max(1))
            .collect()
    }

    /// Flag trust and move trusted hits ahead of the rest, keeping relative order.
    fn rank(&self, hits: Vec<RawHit>) -> Vec<SearchResult> {
        let (trusted, untrusted): (Vec<_>, Vec<_>) = hits
            .into_iter()
            .map(|hit| SearchResult {
                trusted: self.trusted.is_trusted(&hit.url),
                url: hit.url,
                title: hit.title,
                snippet: hit.snippet,
                credibility: None,
            })
            .partition(|result| result.trusted);
        trusted.into_iter().chain(untrusted).collect()
    }

    async fn call_with_retry(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RawHit>, SearchError> {
        let attempts = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            match provider.search(query, max_results).await {
                Ok(hits) => return Ok(hits),
                Err(error) if error.is_transient() && attempt + 1 < attempts => {
                    let delay = self.retry.delay(attempt);
                    debug!(
                        provider = %provider.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying search"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
