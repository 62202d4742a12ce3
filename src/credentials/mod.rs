//! # Credentials
//!
//! A single process-wide token guards every remote call. The [`CredentialGate`]
//! is the mutual-exclusion region shared by the retry executor (held for the
//! duration of each attempt) and the [`CredentialRefresher`] (held while the
//! token is rotated), so no call ever runs against a half-rotated token.

pub mod refresher;

use crate::directory::RemoteError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use uuid::Uuid;

pub use refresher::CredentialRefresher;

/// Source of authentication tokens
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    fn current_token(&self) -> String;

    /// Seconds until the current token expires
    fn token_expires_in_seconds(&self) -> u64;

    /// Obtain a new token and make it current
    async fn refresh_token(&self) -> Result<String, RemoteError>;
}

/// Lock serialising remote calls against token rotation
#[derive(Debug, Clone, Default)]
pub struct CredentialGate {
    lock: Arc<Mutex<()>>,
}

impl CredentialGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    #[cfg(test)]
    pub(crate) fn lock_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

#[derive(Debug)]
struct IssuedToken {
    value: String,
    issued_at: Instant,
}

/// Issues opaque random tokens with a fixed lifetime
#[derive(Debug)]
pub struct LocalTokenProvider {
    lifetime: Duration,
    token: RwLock<IssuedToken>,
}

impl LocalTokenProvider {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            token: RwLock::new(Self::issue()),
        }
    }

    fn issue() -> IssuedToken {
        IssuedToken {
            value: Uuid::new_v4().to_string(),
            issued_at: Instant::now(),
        }
    }
}

#[async_trait]
impl TokenProvider for LocalTokenProvider {
    fn current_token(&self) -> String {
        self.token.read().value.clone()
    }

    fn token_expires_in_seconds(&self) -> u64 {
        let elapsed = self.token.read().issued_at.elapsed();
        self.lifetime.saturating_sub(elapsed).as_secs()
    }

    async fn refresh_token(&self) -> Result<String, RemoteError> {
        let issued = Self::issue();
        let value = issued.value.clone();
        *self.token.write() = issued;
        Ok(value)
    }
}
