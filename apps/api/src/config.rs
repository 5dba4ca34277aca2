use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::generation::generator::RunSettings;
use crate::generation::splitter::SplitPolicy;
use crate::llm_client::gemini::DEFAULT_API_URL;
use crate::llm_client::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Every variable has a default; invalid values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server-side Gemini credential. When unset, callers must send `x-api-key`.
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub port: u16,
    pub rust_log: String,
    pub prompts_file: String,
    pub max_parts: u32,
    pub part_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// `0` disables throttling.
    pub requests_per_minute: u32,
    pub split_max_chars: usize,
    pub split_max_chunks: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gemini_api_key: None,
            gemini_api_url: DEFAULT_API_URL.to_string(),
            port: 5000,
            rust_log: "info".to_string(),
            prompts_file: "data/custom_prompts.json".to_string(),
            max_parts: 2,
            part_delay_ms: 2000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            requests_per_minute: 15,
            split_max_chars: 30_000,
            split_max_chunks: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let config = Config {
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            gemini_api_url: lookup("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            rust_log: lookup("RUST_LOG").unwrap_or(defaults.rust_log),
            prompts_file: lookup("PROMPTS_FILE").unwrap_or(defaults.prompts_file),
            max_parts: parse_or(&lookup, "MAX_PARTS", defaults.max_parts)?,
            part_delay_ms: parse_or(&lookup, "PART_DELAY_MS", defaults.part_delay_ms)?,
            retry_attempts: parse_or(&lookup, "RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay_ms: parse_or(&lookup, "RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            requests_per_minute: parse_or(&lookup, "REQUESTS_PER_MINUTE", defaults.requests_per_minute)?,
            split_max_chars: parse_or(&lookup, "SPLIT_MAX_CHARS", defaults.split_max_chars)?,
            split_max_chunks: match lookup("SPLIT_MAX_CHUNKS") {
                Some(raw) => Some(
                    raw.trim()
                        .parse::<usize>()
                        .with_context(|| format!("SPLIT_MAX_CHUNKS must be a number, got '{raw}'"))?,
                ),
                None => None,
            },
        };

        if config.max_parts == 0 {
            bail!("MAX_PARTS must be at least 1");
        }
        if config.retry_attempts == 0 {
            bail!("RETRY_ATTEMPTS must be at least 1");
        }
        if config.retry_delay_ms == 0 {
            bail!("RETRY_DELAY_MS must be greater than 0");
        }
        if config.split_max_chars == 0 {
            bail!("SPLIT_MAX_CHARS must be greater than 0");
        }
        if config.split_max_chunks == Some(0) {
            bail!("SPLIT_MAX_CHUNKS must be at least 1 when set");
        }

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            max_parts: self.max_parts,
            part_delay: Duration::from_millis(self.part_delay_ms),
            split: SplitPolicy {
                max_chars: self.split_max_chars,
                max_chunks: self.split_max_chunks,
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_parts, 2);
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.split_max_chunks, None);
        assert_eq!(config.gemini_api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k-123"),
            ("PORT", "8080"),
            ("MAX_PARTS", "5"),
            ("SPLIT_MAX_CHUNKS", "4"),
            ("REQUESTS_PER_MINUTE", "0"),
        ])
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("k-123"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.run_settings().max_parts, 5);
        assert_eq!(config.run_settings().split.max_chunks, Some(4));
        assert_eq!(config.requests_per_minute, 0);
    }

    #[test]
    fn test_blank_api_key_is_treated_as_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert_eq!(config.gemini_api_key, None);
    }

    #[test]
    fn test_invalid_values_fail_startup() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("RETRY_DELAY_MS", "0")]).is_err());
        assert!(config_from(&[("MAX_PARTS", "0")]).is_err());
        assert!(config_from(&[("SPLIT_MAX_CHUNKS", "0")]).is_err());
        assert!(config_from(&[("SPLIT_MAX_CHARS", "-5")]).is_err());
    }
}
