//! Error types for the replay engine.
//!

use crate::config::ConfigurationError;
use crate::directory::RemoteError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    /// A remote operation failed with a non-retryable status
    #[error("Remote operation '{operation}' failed: {source}")]
    RemoteFatal {
        operation: String,
        #[source]
        source: RemoteError,
    },
    /// Every attempt of a remote operation failed transiently
    #[error("Remote operation '{operation}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: RemoteError,
    },
    /// A dataset row could not be turned into a movement record
    #[error("Data error in record {record}: {reason}")]
    DataError { record: usize, reason: String },
    #[error("Dataset error: {0}")]
    Dataset(String),
    #[error("Scheduling error: {0}")]
    Scheduling(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl ReplayError {
    /// Name of the remote operation behind this error, if any
    pub fn operation(&self) -> Option<&str> {
        match self {
            ReplayError::RemoteFatal { operation, .. }
            | ReplayError::RetriesExhausted { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Whether the error came out of the retry executor
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ReplayError::RemoteFatal { .. } | ReplayError::RetriesExhausted { .. }
        )
    }
}

impl From<csv::Error> for ReplayError {
    fn from(error: csv::Error) -> Self {
        ReplayError::Dataset(error.to_string())
    }
}

pub type ReplayResult<T> = std::result::Result<T, ReplayError>;
