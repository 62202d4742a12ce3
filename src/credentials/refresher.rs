//! Background token rotation.
//!
//! The refresher sleeps until `refresh_fraction` of the current token's
//! remaining lifetime has elapsed, then rotates the token under the
//! [`CredentialGate`] and installs it on the directory client. Rotation runs on
//! its own schedule, independent of call volume, so it cannot starve.
//!
//! Refresh failures are classified by the same [`RetryPolicy`] that governs
//! directory calls: transient ones are retried after the minimum interval,
//! anything else stops the loop.

use super::{CredentialGate, TokenProvider};
use crate::config::CredentialConfig;
use crate::directory::DirectoryService;
use crate::error::{ReplayError, ReplayResult};
use crate::resilience::{ErrorCategory, RetryPolicy};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct RefresherStats {
    pub rotations: AtomicU64,
    pub failures: AtomicU64,
}

pub struct CredentialRefresher {
    refresher_id: Uuid,
    config: CredentialConfig,
    policy: RetryPolicy,
    provider: Arc<dyn TokenProvider>,
    directory: Arc<dyn DirectoryService>,
    gate: CredentialGate,
    stats: Arc<RefresherStats>,
    shutdown_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for CredentialRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRefresher")
            .field("refresher_id", &self.refresher_id)
            .field("config", &self.config)
            .field("is_running", &self.is_running())
            .finish()
    }
}

impl CredentialRefresher {
    pub fn new(
        config: CredentialConfig,
        policy: RetryPolicy,
        provider: Arc<dyn TokenProvider>,
        directory: Arc<dyn DirectoryService>,
        gate: CredentialGate,
    ) -> Self {
        Self {
            refresher_id: Uuid::new_v4(),
            config,
            policy,
            provider,
            directory,
            gate,
            stats: Arc::new(RefresherStats::default()),
            shutdown_handle: Mutex::new(None),
        }
    }

    pub fn refresher_id(&self) -> Uuid {
        self.refresher_id
    }

    pub fn stats(&self) -> &RefresherStats {
        &self.stats
    }

    /// Install the current token and spawn the rotation loop
    pub fn start(&self) -> ReplayResult<()> {
        let mut handle = self.shutdown_handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(ReplayError::Credential(format!(
                "refresher {} is already running",
                self.refresher_id
            )));
        }

        self.directory.install_token(&self.provider.current_token());

        info!(
            refresher_id = %self.refresher_id,
            refresh_fraction = self.config.refresh_fraction,
            "Starting CredentialRefresher"
        );

        let task = RefreshLoop {
            refresher_id: self.refresher_id,
            config: self.config.clone(),
            policy: self.policy.clone(),
            provider: Arc::clone(&self.provider),
            directory: Arc::clone(&self.directory),
            gate: self.gate.clone(),
            stats: Arc::clone(&self.stats),
        };
        *handle = Some(tokio::spawn(task.run()));
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(handle) = self.shutdown_handle.lock().take() {
            handle.abort();
            info!(refresher_id = %self.refresher_id, "Stopped CredentialRefresher");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Delay before the next rotation, given the seconds left on the token
    pub fn refresh_delay(config: &CredentialConfig, expires_in_seconds: u64) -> Duration {
        let scaled = Duration::from_secs(expires_in_seconds).mul_f64(config.refresh_fraction);
        scaled.max(config.min_refresh_interval())
    }
}

impl Drop for CredentialRefresher {
    fn drop(&mut self) {
        if let Some(handle) = self.shutdown_handle.get_mut().take() {
            handle.abort();
        }
    }
}

struct RefreshLoop {
    refresher_id: Uuid,
    config: CredentialConfig,
    policy: RetryPolicy,
    provider: Arc<dyn TokenProvider>,
    directory: Arc<dyn DirectoryService>,
    gate: CredentialGate,
    stats: Arc<RefresherStats>,
}

impl RefreshLoop {
    async fn run(self) {
        loop {
            let expires_in = self.provider.token_expires_in_seconds();
            let delay = CredentialRefresher::refresh_delay(&self.config, expires_in);
            debug!(
                refresher_id = %self.refresher_id,
                expires_in_seconds = expires_in,
                delay_ms = delay.as_millis() as u64,
                "Next token rotation scheduled"
            );
            tokio::time::sleep(delay).await;

            let rotated = {
                let _guard = self.gate.acquire().await;
                self.provider
                    .refresh_token()
                    .await
                    .map(|token| self.directory.install_token(&token))
            };

            match rotated {
                Ok(()) => {
                    self.stats.rotations.fetch_add(1, Ordering::Relaxed);
                    debug!(refresher_id = %self.refresher_id, "🔑 Token rotated");
                }
                Err(e) if self.policy.classify(&e) == ErrorCategory::Transient => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        refresher_id = %self.refresher_id,
                        error = %e,
                        "Token rotation failed, retrying"
                    );
                    tokio::time::sleep(self.config.min_refresh_interval()).await;
                }
                Err(e) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        refresher_id = %self.refresher_id,
                        operation = "refresh_token",
                        error = %e,
                        "Token rotation failed fatally, refresher stopping"
                    );
                    return;
                }
            }
        }
    }
}
