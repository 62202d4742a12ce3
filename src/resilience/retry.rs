//! # Retry Executor
//!
//! Runs a remote operation up to `max_attempts` times. Each attempt holds the
//! credential gate for exactly the duration of the call; backoff sleeps happen
//! with the gate released so token rotation can proceed in between.

use super::classifier::{ErrorCategory, RetryPolicy};
use crate::credentials::CredentialGate;
use crate::directory::RemoteError;
use crate::error::{ReplayError, ReplayResult};
use std::future::Future;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    gate: CredentialGate,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, gate: CredentialGate) -> Self {
        Self { policy, gate }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    /// Execute `operation`, retrying transient failures with linear backoff
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> ReplayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;

        loop {
            let result = {
                let _guard = self.gate.acquire().await;
                operation().await
            };

            let remote_error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match self.policy.classify(&remote_error) {
                ErrorCategory::Fatal => {
                    error!(
                        operation = operation_name,
                        attempt,
                        code = %remote_error.code,
                        error = %remote_error.message,
                        "❌ Remote operation failed"
                    );
                    return Err(ReplayError::RemoteFatal {
                        operation: operation_name.to_string(),
                        source: remote_error,
                    });
                }
                ErrorCategory::Transient if attempt >= max_attempts => {
                    error!(
                        operation = operation_name,
                        attempts = attempt,
                        code = %remote_error.code,
                        error = %remote_error.message,
                        "❌ Remote operation failed, retries exhausted"
                    );
                    return Err(ReplayError::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        last_error: remote_error,
                    });
                }
                ErrorCategory::Transient => {
                    let backoff = self.policy.backoff_for_attempt(attempt);
                    debug!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        code = %remote_error.code,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient remote failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
