use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    ChatMessage, ChatProvider, LlmError, OpenAiCompatibleProvider, OpenRouterProvider,
    ProviderError,
};
use crate::{
    config::{LlmSettings, ProviderKind},
    retry::RetryPolicy,
};

/// Ordered provider chain. Cheap to clone and safe to share between runs.
#[derive(Clone)]
pub struct LlmClient {
    providers: Vec<Arc<dyn ChatProvider>>,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, retry: RetryPolicy) -> Self {
        Self { providers, retry }
    }

    pub fn from_settings(http: Client, settings: &LlmSettings) -> Self {
        let providers = settings
            .providers
            .iter()
            .map(|provider| -> Arc<dyn ChatProvider> {
                match provider.kind {
                    ProviderKind::IoIntelligence | ProviderKind::OpenAi => {
                        Arc::new(OpenAiCompatibleProvider::new(
                            http.clone(),
                            provider,
                            settings.temperature,
                            settings.request_timeout,
                        ))
                    }
                    ProviderKind::OpenRouter => Arc::new(OpenRouterProvider::new(
                        provider,
                        settings.temperature,
                        settings.request_timeout,
                    )),
                }
            })
            .collect();
        Self::new(providers, settings.retry)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Send `prompt` with `role` as the system instruction. Providers are tried in
    /// order; transient failures are retried on the same provider first.
    pub async fn complete(&self, prompt: &str, role: &str) -> Result<String, LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::NoProviders);
        }
        let messages = [ChatMessage::system(role), ChatMessage::user(prompt)];

        let mut failures = Vec::new();
        for provider in &self.providers {
            match self.call_with_retry(provider.as_ref(), &messages).await {
                Ok(text) => {
                    if !failures.is_empty() {
                        info!(provider = %provider.name(), "Fallback provider answered");
                    }
                    return Ok(text);
                }
                Err(error) => {
                    warn!(provider = %provider.name(), error = %error, "Provider failed, trying next");
                    failures.push((provider.name().to_string(), error));
                }
            }
        }
        Err(LlmError::Exhausted { failures })
    }

    async fn call_with_retry(
        &self,
        provider: &dyn ChatProvider,
        messages: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        let attempts = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            match provider.chat(messages).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_transient() && attempt + 1 < attempts => {
                    let delay = self.retry.delay(attempt);
                    debug!(
                        provider = %provider.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
