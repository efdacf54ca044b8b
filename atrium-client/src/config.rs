//! Configuration loading for the Atrium client stack.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Cache TTL applied when no override is configured.
pub const DEFAULT_CONTENT_TTL_SECS: u64 = 30;

/// Environment variable overriding the content cache TTL, in seconds.
/// Absent or unparseable values fall back to the configured/default TTL.
pub const CONTENT_TTL_ENV: &str = "ATRIUM_CONTENT_TTL_SECS";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub content_base_url: String,
    pub request_timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub default_retries: u32,
    #[serde(default = "default_content_ttl_secs")]
    pub content_ttl_secs: u64,
}

fn default_retries() -> u32 {
    crate::client::DEFAULT_RETRIES
}

fn default_content_ttl_secs() -> u64 {
    DEFAULT_CONTENT_TTL_SECS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply the single supported environment override (cache TTL, read once
    /// at startup). Zero and unparseable values are rejected with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(CONTENT_TTL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.content_ttl_secs = secs,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "ignoring invalid {CONTENT_TTL_ENV}, keeping {}s",
                        self.content_ttl_secs
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.content_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "content_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.content_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "content_ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }
}
