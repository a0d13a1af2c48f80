use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatMessage, ChatProvider, ProviderError};
use crate::config::{ApiKey, ProviderSettings};

/// Any endpoint speaking the OpenAI chat-completions shape (IO.net Intelligence, OpenAI).
pub struct OpenAiCompatibleProvider {
    http: Client,
    name: String,
    base_url: String,
    api_key: ApiKey,
    model: String,
    temperature: f32,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        http: Client,
        settings: &ProviderSettings,
        temperature: f32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            name: settings.kind.name().to_string(),
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature,
            request_timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            name: "test".to_string(),
            base_url: base_url.to_string(),
            api_key: ApiKey::new("test-key"),
            model: "test-model".to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(provider = %self.name, "Rate limited");
            return Err(ProviderError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(ProviderError::Server {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: snippet,
            });
        }

        let body: CompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::BadResponse("no message content".to_string()))?;

        debug!(provider = %self.name, model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}
