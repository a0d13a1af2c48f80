use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, ChatProvider, ProviderError, Role};
use crate::config::ProviderSettings;

/// OpenRouter through the rig agent API
pub struct OpenRouterProvider {
    client: openrouter::Client,
    model: String,
    temperature: f64,
    request_timeout: Duration,
}

impl OpenRouterProvider {
    pub fn new(settings: &ProviderSettings, temperature: f32, request_timeout: Duration) -> Self {
        Self {
            client: openrouter::Client::new(settings.api_key.expose()),
            model: settings.model.clone(),
            temperature: f64::from(temperature),
            request_timeout,
        }
    }
}

/// Split a chat transcript into rig's preamble and prompt
fn split_messages(messages: &[ChatMessage]) -> (String, String) {
    let preamble = messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = messages
        .iter()
        .filter(|message| message.role != Role::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    (preamble, prompt)
}

fn classify(message: String) -> ProviderError {
    let lowered = message.to_lowercase();
    if lowered.contains("429") || lowered.contains("rate limit") {
        ProviderError::RateLimited
    } else if lowered.contains("401") || lowered.contains("unauthorized") {
        ProviderError::Auth { status: 401 }
    } else if lowered.contains("timed out") || lowered.contains("timeout") {
        ProviderError::Timeout
    } else if lowered.contains("error sending request")
        || lowered.contains("connection")
        || lowered.contains("dns error")
    {
        ProviderError::Unreachable(message)
    } else {
        ProviderError::Api { status: 0, message }
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let (preamble, prompt) = split_messages(messages);
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&preamble)
            .temperature(self.temperature)
            .build();

        let response = tokio::time::timeout(self.request_timeout, agent.prompt(&prompt))
            .await
            .map_err(|_| ProviderError::Timeout)?
            .map_err(|e| classify(e.to_string()))?;

        if response.trim().is_empty() {
            return Err(ProviderError::BadResponse("empty completion".to_string()));
        }
        debug!(provider = "openrouter", model = %self.model, "Completion received");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_the_preamble() {
        let (preamble, prompt) = split_messages(&[
            ChatMessage::system("You are an oncologist."),
            ChatMessage::user("Review this staging."),
        ]);
        assert_eq!(preamble, "You are an oncologist.");
        assert_eq!(prompt, "Review this staging.");
    }

    #[test]
    fn rig_errors_are_classified() {
        assert!(classify("HTTP 429 Too Many Requests".into()).is_transient());
        assert!(!classify("401 Unauthorized".into()).is_transient());
        assert!(!classify("provider said no".into()).is_transient());
        assert!(!classify("provider said no".into()).is_unavailable());
        assert!(classify("error sending request for url (https://openrouter.ai/api/v1)".into()).is_unavailable());
    }
}
