//! Relayer configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! gateway_timeout_ms = 30000
//! max_attempts = 3
//! initial_backoff_ms = 500
//! max_backoff_ms = 8000
//! poll_interval_ms = 5000
//! max_block_range = 1000
//! max_cached_requests = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for gateway forwarding and event polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// Upper bound on a single gateway call.
    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,

    /// Gateway attempts per request, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after each failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Pause between two event-log polls once the poller has caught up.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Widest block window requested from the event source in one query.
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,

    /// Finished requests whose outcome is kept for replays. The oldest is
    /// forgotten first.
    #[serde(default = "default_max_cached_requests")]
    pub max_cached_requests: usize,
}

const fn default_gateway_timeout_ms() -> u64 {
    30_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    8_000
}

const fn default_poll_interval_ms() -> u64 {
    5_000
}

const fn default_max_block_range() -> u64 {
    1_000
}

const fn default_max_cached_requests() -> usize {
    10_000
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_ms: default_gateway_timeout_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_block_range: default_max_block_range(),
            max_cached_requests: default_max_cached_requests(),
        }
    }
}

impl RelayerConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "gateway_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Validation(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_block_range == 0 {
            return Err(ConfigError::Validation(
                "max_block_range must be greater than zero".to_string(),
            ));
        }
        if self.max_cached_requests == 0 {
            return Err(ConfigError::Validation(
                "max_cached_requests must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay to wait after the `failed_attempts`-th failure:
    /// `initial_backoff · 2^(failed_attempts − 1)`, capped at `max_backoff`.
    #[must_use]
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(20);
        let delay_ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }
}
