//! # Remote Error Classification
//!
//! Maps a [`RemoteError`] to the handling strategy the retry loop applies:
//! transient failures (expired credentials, temporary unavailability,
//! cancellation) are retried with linear backoff, everything else is fatal.

use crate::config::RetryConfig;
use crate::directory::{RemoteError, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Worth another attempt after a backoff sleep
    Transient,
    /// Surfaced immediately
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Fatal => write!(f, "fatal"),
        }
    }
}

/// Bounded-attempt retry policy with linear backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_increment: Duration,
    pub transient_codes: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            backoff_increment: config.backoff_increment(),
            transient_codes: config.transient_codes.clone(),
        }
    }
}

impl RetryPolicy {
    pub fn classify(&self, error: &RemoteError) -> ErrorCategory {
        if self.transient_codes.contains(&error.code) {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Fatal
        }
    }

    /// Sleep after the `attempt`-th failed attempt (1-based)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_backoff + self.backoff_increment * attempt.saturating_sub(1)
    }
}
