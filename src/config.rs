//! Service configuration, read from the environment.

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://openai.qiniu.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RETENTION_BUDGET: usize = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration for the server binary.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Bearer key for both the chat and TTS endpoints.
    pub api_key: String,
    /// OpenAI-compatible API root.
    pub base_url: String,
    pub llm_model: String,
    pub tts_model: String,
    pub port: u16,
    /// Token ceiling for history compaction.
    pub retention_budget: usize,
    /// Fixed seed for reproducible expressive output and skill draws.
    pub rng_seed: Option<u64>,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = get("QINIU_AI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("QINIU_AI_API_KEY"))?;

        Ok(Self {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            tts_model: get("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.into()),
            port: parse_var(&get, "PORT")?.unwrap_or(DEFAULT_PORT),
            retention_budget: parse_var(&get, "RETENTION_BUDGET")?
                .unwrap_or(DEFAULT_RETENTION_BUDGET),
            rng_seed: parse_var(&get, "RNG_SEED")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("QINIU_AI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm_model, "gpt-3.5-turbo");
        assert_eq!(config.tts_model, "tts-1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.retention_budget, 3000);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("QINIU_AI_API_KEY"))
        );
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("QINIU_AI_API_KEY", "  ")])),
            Err(ConfigError::Missing("QINIU_AI_API_KEY"))
        );
    }

    #[test]
    fn test_overrides_and_invalid_numbers() {
        let config = AppConfig::from_lookup(lookup(&[
            ("QINIU_AI_API_KEY", "k"),
            ("PORT", "8080"),
            ("RETENTION_BUDGET", "500"),
            ("RNG_SEED", "42"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.retention_budget, 500);
        assert_eq!(config.rng_seed, Some(42));

        let err = AppConfig::from_lookup(lookup(&[("QINIU_AI_API_KEY", "k"), ("PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }
}
