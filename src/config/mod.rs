//! # Replay Configuration
//!
//! Typed configuration for the replay engine. Every section has defaults that
//! match the production deployment, so an empty file is a valid
//! configuration apart from the dataset paths the CLI needs.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vessel_replay::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(Some("config/vessel-replay.yaml".as_ref()), None)?;
//! let future_window = manager.config().replay.future_window();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants;
use crate::directory::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring vessel-replay.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Admission control, retention and time shifting
    pub replay: ReplayWindowConfig,

    /// Retry policy for remote operations
    pub retry: RetryConfig,

    /// Token rotation settings
    pub credentials: CredentialConfig,

    /// Source files and parsing rules
    pub dataset: DatasetConfig,

    /// Directory-side twin settings
    pub directory: DirectoryConfig,
}

/// Admission control, retention and time shifting
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplayWindowConfig {
    pub past_window_days: i64,
    pub future_window_days: i64,
    pub retention_window_days: i64,
    pub throttle_poll_interval_ms: u64,
    /// Replay the dataset one calendar year later
    pub shift_one_year: bool,
    /// Explicit shift in days, overriding `shift_one_year`
    pub shift_days: Option<i64>,
    pub skip_past_data: bool,
    /// Delete twins left behind by a previous run before replaying
    pub clear_on_start: bool,
}

impl Default for ReplayWindowConfig {
    fn default() -> Self {
        Self {
            past_window_days: constants::DEFAULT_PAST_WINDOW_DAYS,
            future_window_days: constants::DEFAULT_FUTURE_WINDOW_DAYS,
            retention_window_days: constants::DEFAULT_RETENTION_WINDOW_DAYS,
            throttle_poll_interval_ms: 1_000,
            shift_one_year: true,
            shift_days: None,
            skip_past_data: true,
            clear_on_start: true,
        }
    }
}

impl ReplayWindowConfig {
    pub fn past_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.past_window_days)
    }

    pub fn future_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.future_window_days)
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_window_days)
    }

    pub fn throttle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_poll_interval_ms)
    }
}

/// Retry policy for remote operations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Added to the sleep after every failed attempt (linear backoff)
    pub backoff_increment_ms: u64,
    pub transient_codes: Vec<StatusCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            initial_backoff_ms: constants::DEFAULT_INITIAL_BACKOFF_MS,
            backoff_increment_ms: constants::DEFAULT_BACKOFF_INCREMENT_MS,
            transient_codes: vec![
                StatusCode::Unavailable,
                StatusCode::Unauthenticated,
                StatusCode::Cancelled,
            ],
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn backoff_increment(&self) -> Duration {
        Duration::from_millis(self.backoff_increment_ms)
    }
}

/// Token rotation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub token_duration_seconds: u64,
    pub refresh_fraction: f64,
    pub min_refresh_interval_ms: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            token_duration_seconds: constants::DEFAULT_TOKEN_DURATION_SECONDS,
            refresh_fraction: constants::DEFAULT_TOKEN_REFRESH_FRACTION,
            min_refresh_interval_ms: 1_000,
        }
    }
}

impl CredentialConfig {
    pub fn token_duration(&self) -> Duration {
        Duration::from_secs(self.token_duration_seconds)
    }

    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.min_refresh_interval_ms)
    }
}

/// Source files and parsing rules
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub vessel_movement_path: Option<PathBuf>,
    pub vessel_info_path: Option<PathBuf>,
    pub datetime_format: String,
    pub skip_malformed_records: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            vessel_movement_path: None,
            vessel_info_path: None,
            datetime_format: constants::dataset_fields::DEFAULT_DATETIME_FORMAT.to_string(),
            skip_malformed_records: false,
        }
    }
}

/// Directory-side twin settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Calls the in-memory backend keeps for inspection; zero keeps counts only
    pub operation_history: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            latitude: constants::PORT_LATITUDE,
            longitude: constants::PORT_LONGITUDE,
            operation_history: constants::DEFAULT_OPERATION_HISTORY,
        }
    }
}

impl ReplayConfig {
    /// Reject values that would stall or break the replay
    pub fn validate(&self) -> ConfigResult<()> {
        let replay = &self.replay;
        for (field, value) in [
            ("replay.past_window_days", replay.past_window_days),
            ("replay.future_window_days", replay.future_window_days),
            ("replay.retention_window_days", replay.retention_window_days),
        ] {
            if value <= 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "window must be at least one day",
                ));
            }
            if value > constants::MAX_CONFIGURED_DAYS {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    format!("window cannot exceed {} days", constants::MAX_CONFIGURED_DAYS),
                ));
            }
        }

        if let Some(days) = replay.shift_days {
            if days.unsigned_abs() > constants::MAX_CONFIGURED_DAYS.unsigned_abs() {
                return Err(ConfigurationError::invalid_value(
                    "replay.shift_days",
                    days,
                    format!(
                        "shift must be within {} days either way",
                        constants::MAX_CONFIGURED_DAYS
                    ),
                ));
            }
        }

        if replay.throttle_poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "replay.throttle_poll_interval_ms",
                0,
                "poll interval must be positive",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                0,
                "at least one attempt is required",
            ));
        }

        let fraction = self.credentials.refresh_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "credentials.refresh_fraction",
                fraction,
                "must be within (0, 1]",
            ));
        }

        if self.dataset.datetime_format.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "dataset.datetime_format",
                "\"\"",
                "datetime format cannot be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReplayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.replay.future_window(), chrono::Duration::days(3));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.retry.backoff_increment(), Duration::from_secs(2));
        assert_eq!(config.dataset.datetime_format, "%d/%m/%Y %H:%M");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = ReplayConfig::default();
        config.retry.max_attempts = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { ref field, .. } if field == "retry.max_attempts"
        ));
    }

    #[test]
    fn test_window_and_fraction_bounds() {
        let mut config = ReplayConfig::default();
        config.replay.future_window_days = 0;
        assert!(config.validate().is_err());

        let mut config = ReplayConfig::default();
        config.credentials.refresh_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = ReplayConfig::default();
        config.credentials.refresh_fraction = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_day_counts_rejected() {
        let mut config = ReplayConfig::default();
        config.replay.shift_days = Some(i64::MAX);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { ref field, .. } if field == "replay.shift_days"
        ));

        config.replay.shift_days = Some(i64::MIN);
        assert!(config.validate().is_err());

        config.replay.shift_days = Some(-constants::MAX_CONFIGURED_DAYS);
        assert!(config.validate().is_ok());

        let mut config = ReplayConfig::default();
        config.replay.retention_window_days = constants::MAX_CONFIGURED_DAYS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_section_defaults() {
        let config: ReplayConfig = serde_json::from_str(
            r#"{ "replay": { "future_window_days": 5 }, "retry": { "max_attempts": 4 } }"#,
        )
        .unwrap();

        assert_eq!(config.replay.future_window_days, 5);
        assert_eq!(config.replay.past_window_days, 3);
        assert!(config.replay.shift_one_year);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.transient_codes.len(), 3);
    }
}
