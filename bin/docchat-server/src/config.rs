//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use docchat_provider::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Runtime configuration for docchat-server.
///
/// Every field except the API key has a default; [`Config::validate`]
/// rejects a configuration without one.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// Provider credential. Required.
    pub api_key: String,

    /// Provider base URL, without a trailing slash.
    pub base_url: String,

    /// Assistant used for retrieval-augmented runs. May be empty.
    pub assistant_id: String,

    /// Model for direct and fallback completions.
    pub model: String,

    /// Upper bound on one response, setup included.
    pub max_duration: Duration,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated allowed origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve `/swagger-ui` and `/api-docs/openapi.json`.
    pub enable_swagger: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("assistant_id", &self.assistant_id)
            .field("model", &self.model)
            .field("max_duration", &self.max_duration)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .finish()
    }
}

/// Reasons a configuration is refused at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set or empty")]
    MissingApiKey,

    #[error("DOCCHAT_MAX_DURATION_SECS must be greater than zero")]
    ZeroDuration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Self {
            bind_address: env_or("DOCCHAT_BIND", "0.0.0.0:3000"),
            api_key: env_or("OPENAI_API_KEY", ""),
            base_url: env_or("OPENAI_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_owned(),
            assistant_id: env_or("ASSISTANT_ID", ""),
            model: env_or("DOCCHAT_MODEL", DEFAULT_MODEL),
            max_duration: Duration::from_secs(parse_env(&lookup, "DOCCHAT_MAX_DURATION_SECS", 30)),
            log_level: env_or("DOCCHAT_LOG", "info"),
            log_json: lookup("DOCCHAT_LOG_JSON").is_some_and(|v| is_truthy(&v)),
            cors_allowed_origins: lookup("DOCCHAT_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_swagger: lookup("DOCCHAT_ENABLE_SWAGGER").is_none_or(|v| is_truthy(&v)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.max_duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        Ok(())
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

// ── Tests ──────────────────────────────────────────────────────────────────────
