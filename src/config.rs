//! Environment-derived settings.
//!
//! Everything the core consumes is read once at startup. A missing or
//! malformed upstream credential is a [`ConfigError`], which `main` treats as
//! fatal; it is never reported as a per-request failure.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("OPENAI_API_KEY does not look like a valid key")]
    InvalidApiKey,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Application settings.
///
/// Environment variables and defaults:
/// - `ENVIRONMENT` (development)
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_BASE_URL` (https://api.openai.com/v1)
/// - `OPENAI_MODEL` (gpt-4o-mini)
/// - `OPENAI_TIMEOUT` seconds (20)
/// - `OPENAI_MAX_RETRIES` (2)
/// - `RATE_LIMIT_PER_MINUTE` (60) / `RATE_LIMIT_PER_HOUR` (1000)
/// - `MAX_TEXT_LENGTH` (5000) / `MAX_TOKENS` (1000)
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_timeout: Duration,
    pub openai_max_retries: u32,
    pub rate_limit_per_minute: usize,
    pub rate_limit_per_hour: usize,
    pub max_text_length: usize,
    pub max_tokens: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        if !valid_api_key(&api_key) {
            return Err(ConfigError::InvalidApiKey);
        }

        let timeout_secs: f64 = parse_env("OPENAI_TIMEOUT", 20.0)?;

        Ok(Self {
            environment: env_or("ENVIRONMENT", "development"),
            openai_api_key: api_key,
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_timeout: Duration::from_secs_f64(timeout_secs),
            openai_max_retries: parse_env("OPENAI_MAX_RETRIES", 2)?,
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 60)?,
            rate_limit_per_hour: parse_env("RATE_LIMIT_PER_HOUR", 1000)?,
            max_text_length: parse_env("MAX_TEXT_LENGTH", 5000)?,
            max_tokens: parse_env("MAX_TOKENS", 1000)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            trimmed
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key, value: raw })
        }
    }
}

/// Shape check for the upstream credential: `sk-` prefix (which also covers
/// `sk-proj-`) and a plausible length.
fn valid_api_key(key: &str) -> bool {
    key.starts_with("sk-") && (20..=200).contains(&key.len())
}
