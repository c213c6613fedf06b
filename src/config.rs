use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::relay::RelayOptions;
use crate::tools::weather::DEFAULT_FORECAST_ENDPOINT;

pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MODELS: [&str; 2] = ["gpt-4o", "gpt-4o-mini"];
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Format every answer as \
     GitHub-flavoured markdown. When weather data is provided, present it as a table.";

/// Connection settings for the chat completion deployment.
#[derive(Clone, Debug)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ForecastConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl ForecastConfig {
    /// Forecast settings alone; the completion credentials are not needed.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            endpoint: var(&lookup, "FORECAST_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_FORECAST_ENDPOINT.to_string()),
            request_timeout: request_timeout(&lookup)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub completion: CompletionConfig,
    pub forecast: ForecastConfig,
    pub allowed_models: Vec<String>,
    pub system_prompt: Option<String>,
}

impl RelayConfig {
    /// Reads the process environment, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = required(&lookup, "AZURE_OPENAI_ENDPOINT")?
            .trim_end_matches('/')
            .to_string();
        let max_tokens = u32::try_from(parsed(&lookup, "RELAY_MAX_TOKENS", DEFAULT_MAX_TOKENS as u64)?)
            .map_err(|_| RelayError::Config("RELAY_MAX_TOKENS is too large".to_string()))?;

        let allowed_models = match var(&lookup, "RELAY_ALLOWED_MODELS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        };

        let system_prompt = match var(&lookup, "RELAY_SYSTEM_PROMPT") {
            Some(p) if p.eq_ignore_ascii_case("none") => None,
            Some(p) => Some(p),
            None => Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        Ok(Self {
            completion: CompletionConfig {
                endpoint,
                api_key: required(&lookup, "AZURE_OPENAI_API_KEY")?,
                api_version: var(&lookup, "AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                max_tokens,
                request_timeout: request_timeout(&lookup)?,
            },
            forecast: ForecastConfig::from_lookup(&lookup)?,
            allowed_models,
            system_prompt,
        })
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            system_prompt: self.system_prompt.clone(),
            allowed_models: self.allowed_models.clone(),
        }
    }
}

fn var<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<String> {
    var(lookup, key).ok_or_else(|| RelayError::Config(format!("{} is not set", key)))
}

fn parsed<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u64) -> Result<u64> {
    match var(lookup, key) {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            RelayError::Config(format!("{} must be a positive integer: {}", key, e))
        }),
        None => Ok(default),
    }
}

fn request_timeout<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Duration> {
    parsed(lookup, "RELAY_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com/"),
            ("AZURE_OPENAI_API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.completion.endpoint, "https://example.openai.azure.com");
        assert_eq!(config.completion.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.completion.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.forecast.endpoint, DEFAULT_FORECAST_ENDPOINT);
        assert_eq!(config.allowed_models, vec!["gpt-4o", "gpt-4o-mini"]);
        assert_eq!(config.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = RelayConfig::from_lookup(lookup(&[(
            "AZURE_OPENAI_ENDPOINT",
            "https://example.openai.azure.com",
        )]))
        .unwrap_err();

        assert!(matches!(err, RelayError::Config(ref m) if m.contains("AZURE_OPENAI_API_KEY")));
    }

    #[test]
    fn test_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("AZURE_OPENAI_ENDPOINT", "http://localhost:9000"),
            ("AZURE_OPENAI_API_KEY", "secret"),
            ("RELAY_ALLOWED_MODELS", "gpt-4o, my-deployment ,"),
            ("RELAY_SYSTEM_PROMPT", "none"),
            ("RELAY_REQUEST_TIMEOUT_MS", "1500"),
            ("RELAY_MAX_TOKENS", "256"),
        ]))
        .unwrap();

        assert_eq!(config.allowed_models, vec!["gpt-4o", "my-deployment"]);
        assert!(config.system_prompt.is_none());
        assert_eq!(config.completion.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.forecast.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.completion.max_tokens, 256);
    }

    #[test]
    fn test_forecast_config_without_completion_keys() {
        let config = ForecastConfig::from_lookup(lookup(&[
            ("FORECAST_ENDPOINT", "http://localhost:8080/v1/forecast"),
            ("RELAY_REQUEST_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:8080/v1/forecast");
        assert_eq!(config.request_timeout, Duration::from_millis(2500));

        let config = ForecastConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint, DEFAULT_FORECAST_ENDPOINT);
        assert_eq!(config.request_timeout, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS));

        let err = ForecastConfig::from_lookup(lookup(&[("RELAY_REQUEST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[
            ("AZURE_OPENAI_ENDPOINT", "http://localhost:9000"),
            ("AZURE_OPENAI_API_KEY", "secret"),
            ("RELAY_MAX_TOKENS", "lots"),
        ]))
        .unwrap_err();

        assert!(matches!(err, RelayError::Config(_)));
    }
}
