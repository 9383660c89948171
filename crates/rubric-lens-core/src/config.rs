//! Environment-driven configuration.
//!
//! Every struct's `Default` reads its environment variables and falls back to
//! built-in values, so `LensConfig::from_env()` is all a binary needs.
//!
//! | Variable                     | Field                              |
//! |------------------------------|------------------------------------|
//! | `RUBRIC_LENS_API_KEY`        | `engine.api_key` (or `GEMINI_API_KEY`) |
//! | `RUBRIC_LENS_MODEL`          | `engine.model`                     |
//! | `RUBRIC_LENS_BASE_URL`       | `engine.base_url`                  |
//! | `RUBRIC_LENS_TIMEOUT_MS`     | `retry.timeout_ms`                 |
//! | `RUBRIC_LENS_MAX_RETRIES`    | `retry.max_retries`                |
//! | `RUBRIC_LENS_BACKOFF_MS`     | `retry.backoff_base_ms`            |
//! | `RUBRIC_LENS_MISSING_POLICY` | `missing_policy`                   |

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::RetryPolicy;
use crate::validator::MissingCriterionPolicy;

/// Default engine endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model used for evaluation.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no API key configured (set RUBRIC_LENS_API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Engine connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Never serialized, so dumped configs don't leak it.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            api_key: std::env::var("RUBRIC_LENS_API_KEY")
                .or_else(|_| std::env::var("GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("RUBRIC_LENS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("RUBRIC_LENS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            temperature: 0.2,
        }
    }
}

impl EngineConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific endpoint, ignoring the environment.
    pub fn new(base_url: &str, model: &str) -> Self {
        EngineConfig {
            api_key: None,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.2,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// The API key, or `ConfigError::MissingApiKey`.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

/// Everything the evaluation pipeline can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    pub engine: EngineConfig,
    pub retry: RetryPolicy,
    pub missing_policy: MissingCriterionPolicy,
}

impl Default for LensConfig {
    fn default() -> Self {
        let mut retry = RetryPolicy::default();
        if let Some(v) = env_parse::<u64>("RUBRIC_LENS_TIMEOUT_MS") {
            retry.timeout_ms = v;
        }
        if let Some(v) = env_parse::<u32>("RUBRIC_LENS_MAX_RETRIES") {
            retry.max_retries = v;
        }
        if let Some(v) = env_parse::<u64>("RUBRIC_LENS_BACKOFF_MS") {
            retry.backoff_base_ms = v;
        }

        LensConfig {
            engine: EngineConfig::from_env(),
            retry,
            missing_policy: env_parse("RUBRIC_LENS_MISSING_POLICY").unwrap_or_default(),
        }
    }
}

impl LensConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_missing_policy(mut self, policy: MissingCriterionPolicy) -> Self {
        self.missing_policy = policy;
        self
    }
}

/// Parse an env var, warning (not failing) on garbage.
fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key = %key, value = %raw, error = %e, "ignoring invalid config value");
            None
        }
    }
}
