//! # Directory Service Boundary
//!
//! The replay engine talks to the twin directory only through the
//! [`DirectoryService`] trait. Every operation returns a [`RemoteError`]
//! carrying an RPC-style [`StatusCode`], which the retry executor classifies
//! as transient or fatal.
//!
//! Transports are expected to enforce their own per-call deadline; the engine
//! bounds attempts, not wall-clock time.

pub mod in_memory;

use crate::models::{ChannelMetadataUpdate, ChannelValues, EntityId, Property, TwinStructure};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use in_memory::{DirectoryOperation, InMemoryDirectory, OperationKind};

/// Status of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Unavailable,
    Unauthenticated,
    Cancelled,
    DeadlineExceeded,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Internal,
    Unknown,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Unavailable => "unavailable",
            StatusCode::Unauthenticated => "unauthenticated",
            StatusCode::Cancelled => "cancelled",
            StatusCode::DeadlineExceeded => "deadline_exceeded",
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::NotFound => "not_found",
            StatusCode::AlreadyExists => "already_exists",
            StatusCode::PermissionDenied => "permission_denied",
            StatusCode::FailedPrecondition => "failed_precondition",
            StatusCode::Internal => "internal",
            StatusCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: StatusCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }
}

/// Remote twin directory
#[async_trait]
pub trait DirectoryService: Send + Sync + 'static {
    /// Register a new identity for a human-readable key name
    async fn create_entity_identity(&self, key_name: &str) -> Result<EntityId, RemoteError>;

    /// Create the twin, or replace it wholesale if it exists
    async fn upsert_entity(
        &self,
        entity_id: &EntityId,
        structure: &TwinStructure,
    ) -> Result<(), RemoteError>;

    async fn update_channel_metadata(
        &self,
        entity_id: &EntityId,
        update: &ChannelMetadataUpdate,
    ) -> Result<(), RemoteError>;

    async fn publish_channel_data(
        &self,
        entity_id: &EntityId,
        channel_id: &str,
        values: &ChannelValues,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), RemoteError>;

    async fn delete_entity(&self, entity_id: &EntityId) -> Result<(), RemoteError>;

    /// Twins carrying every one of `properties`
    async fn search_entities(&self, properties: &[Property]) -> Result<Vec<EntityId>, RemoteError>;

    /// Install a freshly rotated token on the client channel
    fn install_token(&self, token: &str);
}
