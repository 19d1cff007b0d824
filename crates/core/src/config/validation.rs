//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Largest accepted pool width.
const MAX_CONCURRENCY: usize = 256;

/// Largest accepted batched-read size.
const MAX_BATCH_SIZE: usize = 5_000;

/// Longest accepted pause between mutations (10 minutes).
const MAX_COMMIT_DELAY_MS: u64 = 600_000;

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

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `api_url` is empty or not http(s)
    /// - a pool width is 0 or exceeds 256
    /// - `cache_batch_size` is 0 or exceeds 5000
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `commit_delay_ms` exceeds 10 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(invalid("api_url", "must not be empty"));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(invalid("api_url", "must be an http(s) URL"));
        }

        for (field, value) in [
            ("cache_concurrency", self.cache_concurrency),
            ("scan_concurrency", self.scan_concurrency),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
            if value > MAX_CONCURRENCY {
                return Err(invalid(field, "must not exceed 256"));
            }
        }

        if self.cache_batch_size == 0 {
            return Err(invalid("cache_batch_size", "must be greater than 0"));
        }
        if self.cache_batch_size > MAX_BATCH_SIZE {
            return Err(invalid("cache_batch_size", "must not exceed 5000"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.commit_delay_ms > MAX_COMMIT_DELAY_MS {
            return Err(invalid("commit_delay_ms", "must not exceed 10 minutes (600000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.commit_delay_ms == 0 {
            tracing::warn!("commit_delay_ms is 0; mutations will not be paced");
        }

        Ok(())
    }
}
