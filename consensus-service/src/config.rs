//! Environment-driven settings.
//!
//! Everything is read once at startup through [`Settings::from_env`]. Tests build
//! settings from a plain map with [`Settings::from_lookup`].

use std::{fmt, str::FromStr, time::Duration};

use crate::{error::ConsensusError, retry::RetryPolicy, search::domains::DEFAULT_TRUSTED_DOMAINS};

pub const IOINTELLIGENCE_BASE_URL: &str = "https://api.intelligence.io.solutions/api/v1";
pub const IOINTELLIGENCE_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";
pub const OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_PROVIDER_ORDER: &str = "iointelligence,openai,openrouter";

/// Secret that never shows up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    IoIntelligence,
    OpenAi,
    OpenRouter,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::IoIntelligence => "iointelligence",
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iointelligence" | "io.net" | "ionet" => Ok(ProviderKind::IoIntelligence),
            "openai" => Ok(ProviderKind::OpenAi),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            other => Err(ConsensusError::Config(format!(
                "unknown LLM provider '{other}' in LLM_PROVIDER_ORDER"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: ApiKey,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Priority order; the first entry is the primary provider
    pub providers: Vec<ProviderSettings>,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct GoogleSearchSettings {
    pub api_key: ApiKey,
    pub engine_id: String,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub serpapi_key: Option<ApiKey>,
    pub google: Option<GoogleSearchSettings>,
    pub max_results: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub trusted_domains: Vec<String>,
}

/// Time budget per stage type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub research: Duration,
    pub diagnosis: Duration,
    pub consensus: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            research: Duration::from_secs(90),
            diagnosis: Duration::from_secs(120),
            consensus: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub stages: StageTimeouts,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConsensusError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings after loading a `.env` file from the working directory, if any.
    /// Variables already set in the process win over the file.
    pub fn load() -> Result<Self, ConsensusError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConsensusError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let request_timeout = Duration::from_secs(env.parse_or("REQUEST_TIMEOUT_SECS", 30u64)?);
        let retry = RetryPolicy::new(
            env.parse_or("MAX_RETRIES", 3u32)?,
            Duration::from_millis(env.parse_or("RETRY_BACKOFF_MS", 1000u64)?),
        );

        let order = env
            .value("LLM_PROVIDER_ORDER")
            .unwrap_or_else(|| DEFAULT_PROVIDER_ORDER.to_string());
        let mut providers = Vec::new();
        for name in order.split(',').filter(|name| !name.trim().is_empty()) {
            let kind: ProviderKind = name.parse()?;
            if providers.iter().any(|p: &ProviderSettings| p.kind == kind) {
                continue;
            }
            if let Some(provider) = env.provider(kind) {
                providers.push(provider);
            }
        }
        if providers.is_empty() {
            return Err(ConsensusError::Config(
                "no LLM provider configured: set IOINTELLIGENCE_API_KEY, OPENAI_API_KEY or OPENROUTER_API_KEY"
                    .to_string(),
            ));
        }

        let llm = LlmSettings {
            providers,
            temperature: env.parse_or("LLM_TEMPERATURE", 0.7f32)?,
            request_timeout,
            retry,
        };

        let google = match (env.value("GOOGLE_API_KEY"), env.value("GOOGLE_CSE_ID")) {
            (Some(key), Some(engine_id)) => Some(GoogleSearchSettings {
                api_key: ApiKey::new(key),
                engine_id,
            }),
            _ => None,
        };
        let trusted_domains = match env.value("TRUSTED_DOMAINS") {
            Some(list) => list
                .split(',')
                .map(|domain| domain.trim().to_lowercase())
                .filter(|domain| !domain.is_empty())
                .collect(),
            None => DEFAULT_TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        };
        let search = SearchSettings {
            serpapi_key: env.value("SERPAPI_API_KEY").map(ApiKey::new),
            google,
            max_results: env.parse_or("SEARCH_MAX_RESULTS", 5usize)?,
            request_timeout,
            retry,
            trusted_domains,
        };

        let stages = StageTimeouts {
            research: Duration::from_secs(env.parse_or("RESEARCH_TIMEOUT_SECS", 90u64)?),
            diagnosis: Duration::from_secs(env.parse_or("DIAGNOSIS_TIMEOUT_SECS", 120u64)?),
            consensus: Duration::from_secs(env.parse_or("CONSENSUS_TIMEOUT_SECS", 120u64)?),
        };

        Ok(Self {
            llm,
            search,
            stages,
            port: env.parse_or("PORT", 3000u16)?,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value
    fn value(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConsensusError> {
        match self.value(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConsensusError::Config(format!("{key} has invalid value '{raw}'"))),
            None => Ok(default),
        }
    }

    fn provider(&self, kind: ProviderKind) -> Option<ProviderSettings> {
        let (key_var, base_var, model_var, base_default, model_default) = match kind {
            ProviderKind::IoIntelligence => (
                "IOINTELLIGENCE_API_KEY",
                "IOINTELLIGENCE_BASE_URL",
                "IOINTELLIGENCE_MODEL",
                IOINTELLIGENCE_BASE_URL,
                IOINTELLIGENCE_MODEL,
            ),
            ProviderKind::OpenAi => (
                "OPENAI_API_KEY",
                "OPENAI_BASE_URL",
                "OPENAI_MODEL",
                OPENAI_BASE_URL,
                OPENAI_MODEL,
            ),
            ProviderKind::OpenRouter => (
                "OPENROUTER_API_KEY",
                "OPENROUTER_BASE_URL",
                "OPENROUTER_MODEL",
                "",
                OPENROUTER_MODEL,
            ),
        };
        let api_key = self.value(key_var)?;
        Some(ProviderSettings {
            kind,
            api_key: ApiKey::new(api_key),
            base_url: self
                .value(base_var)
                .unwrap_or_else(|| base_default.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: self.value(model_var).unwrap_or_else(|| model_default.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConsensusError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn dotenv_file_supplies_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# provider keys\nexport OPENROUTER_API_KEY=\"or-key\"\nLLM_PROVIDER_ORDER=openrouter\nDIAGNOSIS_TIMEOUT_SECS=45\n",
        )
        .unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let settings = Settings::from_lookup(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(settings.llm.providers.len(), 1);
        assert_eq!(settings.llm.providers[0].kind, ProviderKind::OpenRouter);
        assert_eq!(settings.llm.providers[0].api_key.expose(), "or-key");
        assert_eq!(settings.stages.diagnosis, Duration::from_secs(45));
    }

    #[test]
    fn missing_llm_keys_is_a_config_error() {
        let err = settings(&[("SERPAPI_API_KEY", "s")]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(settings.llm.providers.len(), 1);
        assert_eq!(settings.llm.providers[0].model, OPENAI_MODEL);
        assert_eq!(settings.llm.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.llm.retry.max_retries, 3);
        assert_eq!(settings.stages, StageTimeouts::default());
        assert!(settings.search.trusted_domains.contains(&"mayoclinic.org".to_string()));
        assert!(settings.search.google.is_none());
    }

    #[test]
    fn provider_order_is_respected() {
        let settings = settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("IOINTELLIGENCE_API_KEY", "io-test"),
            ("LLM_PROVIDER_ORDER", "openai, iointelligence"),
        ])
        .unwrap();
        let kinds: Vec<_> = settings.llm.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::OpenAi, ProviderKind::IoIntelligence]);
        assert_eq!(settings.llm.providers[1].base_url, IOINTELLIGENCE_BASE_URL);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = settings(&[("OPENAI_API_KEY", "k"), ("MAX_RETRIES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let settings = settings(&[("OPENAI_API_KEY", "sk-secret")]).unwrap();
        assert!(!format!("{:?}", settings.llm).contains("sk-secret"));
    }
}
