//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        ConfigurationError::LoadFailed(error.to_string())
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
