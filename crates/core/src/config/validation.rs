//! Configuration validation rules.
//!
//! Checks `AppConfig` values after they have been loaded from
//! environment, files, or defaults.

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
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_name`, `cache_version`, `sync_tag` or `user_agent` is empty
    /// - a `precache` entry is not root-relative
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url().map_err(|e| invalid("origin", e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        for (field, value) in [
            ("cache_name", &self.cache_name),
            ("cache_version", &self.cache_version),
            ("sync_tag", &self.sync_tag),
            ("user_agent", &self.user_agent),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if let Some(path) = self.precache.iter().find(|p| !p.starts_with('/') || p.starts_with("//")) {
            return Err(invalid("precache", format!("{path:?} must be a root-relative path")));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.network_first.iter().chain(&self.cache_first).any(|p| p.is_empty()) {
            tracing::warn!("empty route pattern configured; it matches every same-origin request");
        }

        Ok(())
    }
}
