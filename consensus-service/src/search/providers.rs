use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{RawHit, SearchError, SearchProvider};
use crate::config::{ApiKey, GoogleSearchSettings};

const SERPAPI_BASE: &str = "https://serpapi.com";
const GOOGLE_CSE_BASE: &str = "https://www.googleapis.com";
/// Google Custom Search caps `num` at 10
const GOOGLE_MAX_NUM: usize = 10;

fn check_status(status: StatusCode) -> Result<(), SearchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(SearchError::RateLimited)
    } else if !status.is_success() {
        Err(SearchError::Api {
            status: status.as_u16(),
        })
    } else {
        Ok(())
    }
}

pub struct SerpApiProvider {
    http: Client,
    api_key: ApiKey,
    base_url: String,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiHit>,
}

#[derive(Deserialize)]
struct SerpApiHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerpApiProvider {
    pub fn new(http: Client, api_key: ApiKey, request_timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            base_url: SERPAPI_BASE.to_string(),
            request_timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawHit>, SearchError> {
        let num = (max_results * 2).to_string();
        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("api_key", self.api_key.expose()),
            ])
            .timeout(self.request_timeout)
            .send()
            .await?;
        check_status(response.status())?;

        let body: SerpApiResponse = response.json().await?;
        debug!(provider = "serpapi", hits = body.organic_results.len(), "Search complete");
        Ok(body
            .organic_results
            .into_iter()
            .filter(|hit| !hit.link.is_empty())
            .map(|hit| RawHit {
                title: hit.title,
                url: hit.link,
                snippet: hit.snippet,
            })
            .collect())
    }
}

pub struct GoogleCustomSearchProvider {
    http: Client,
    api_key: ApiKey,
    engine_id: String,
    base_url: String,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleHit>,
}

#[derive(Deserialize)]
struct GoogleHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl GoogleCustomSearchProvider {
    pub fn new(http: Client, settings: &GoogleSearchSettings, request_timeout: Duration) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            engine_id: settings.engine_id.clone(),
            base_url: GOOGLE_CSE_BASE.to_string(),
            request_timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            engine_id: "test-cx".to_string(),
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleCustomSearchProvider {
    fn name(&self) -> &str {
        "google_cse"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawHit>, SearchError> {
        let num = (max_results * 2).clamp(1, GOOGLE_MAX_NUM).to_string();
        let response = self
            .http
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&[
                ("key", self.api_key.expose()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .timeout(self.request_timeout)
            .send()
            .await?;
        check_status(response.status())?;

        let body: GoogleResponse = response.json().await?;
        debug!(provider = "google_cse", hits = body.items.len(), "Search complete");
        Ok(body
            .items
            .into_iter()
            .filter(|hit| !hit.link.is_empty())
            .map(|hit| RawHit {
                title: hit.title,
                url: hit.link,
                snippet: hit.snippet,
            })
            .collect())
    }
}
