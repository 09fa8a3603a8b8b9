//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_name` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `origin` or any asset does not resolve to an http(s) URL
    /// - `media_markers` is empty or contains an empty marker
    /// - `max_bytes` is 0 or exceeds 512MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_name".into(),
                hint: "Set KEEPSAKE_CACHE_NAME to the current cache version".into(),
            });
        }

        let manifest = self.manifest()?;

        if self.media_markers.is_empty() {
            return Err(ConfigError::Invalid { field: "media_markers".into(), reason: "must not be empty".into() });
        }
        if self.media_markers.iter().any(|m| m.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "media_markers".into(),
                reason: "markers must not be empty strings".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 512 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 512MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        let mut seen = HashSet::new();
        let duplicates = manifest.iter().filter(|url| !seen.insert(url.as_str())).count();
        if duplicates > 0 {
            tracing::warn!(duplicates, "asset manifest lists the same URL more than once");
        }

        Ok(())
    }
}
