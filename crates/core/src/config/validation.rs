//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - a timeout is below 100ms or above 5 minutes
    /// - partition names are empty or equal
    /// - a prefix or the offline path is not absolute
    /// - a remote host pattern is not a valid regular expression
    /// - the retry policy allows no attempts or a zero backoff
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        for (field, value) in [("timeout_ms", self.timeout_ms), ("network_timeout_ms", self.network_timeout_ms)] {
            if value < 100 {
                return Err(invalid(field, "must be at least 100ms"));
            }
            if value > 300_000 {
                return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        url::Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;

        if self.static_cache.is_empty() {
            return Err(invalid("static_cache", "must not be empty"));
        }
        if self.dynamic_cache.is_empty() {
            return Err(invalid("dynamic_cache", "must not be empty"));
        }
        if self.static_cache == self.dynamic_cache {
            return Err(invalid("dynamic_cache", "must differ from static_cache"));
        }

        for (field, path) in [
            ("static_prefix", &self.static_prefix),
            ("internal_api_prefix", &self.internal_api_prefix),
            ("offline_path", &self.offline_path),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }

        for pattern in &self.remote_hosts {
            regex::Regex::new(pattern).map_err(|e| invalid("remote_hosts", format!("{pattern}: {e}")))?;
        }

        if self.install_manifest.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("install_manifest", "entries must not be empty"));
        }

        if self.dynamic_max_entries == Some(0) {
            return Err(invalid("dynamic_max_entries", "must be greater than 0 when set"));
        }

        if self.replay_max_attempts == 0 {
            return Err(invalid("replay_max_attempts", "must be at least 1"));
        }
        if self.replay_backoff_ms == 0 {
            return Err(invalid("replay_backoff_ms", "must be greater than 0"));
        }
        if self.replay_max_backoff_ms < self.replay_backoff_ms {
            return Err(invalid("replay_max_backoff_ms", "must not be below replay_backoff_ms"));
        }

        if self.install_manifest.is_empty() {
            tracing::warn!("install_manifest is empty; the static partition will only fill at runtime");
        }

        Ok(())
    }
}
