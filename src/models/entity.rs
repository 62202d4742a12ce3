use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned to a twin by the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A twin that has been created and not yet deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandle {
    pub entity_id: EntityId,
    /// Source key (ship name) the twin was created for
    pub entity_key: String,
    pub created_at: DateTime<Utc>,
    /// Bumped by the registry each time a voyage takes over the twin
    pub voyage: u64,
}

impl EntityHandle {
    pub fn new(entity_id: EntityId, entity_key: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            entity_key: entity_key.into(),
            created_at,
            voyage: 0,
        }
    }
}

/// Human-readable key name used when requesting a new identity
pub fn identity_key_name(entity_key: &str) -> String {
    entity_key.trim().to_lowercase().replace(' ', "_")
}
