//! In-process directory used by the CLI dry-run mode and by tests.
//!
//! Keeps the most recent successful calls in order, a running count per call
//! kind, and can be scripted to fail the next N calls of a given kind with a
//! chosen status code. The call history is capped so a long dry run holds a
//! bounded window of calls; the counts are never trimmed.

use super::{DirectoryService, RemoteError, StatusCode};
use crate::constants::DEFAULT_OPERATION_HISTORY;
use crate::models::{ChannelMetadataUpdate, ChannelValues, EntityId, Property, TwinStructure};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateIdentity,
    Upsert,
    UpdateMetadata,
    Publish,
    Delete,
    Search,
}

/// One successful call, as seen by the directory
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryOperation {
    CreateIdentity {
        key_name: String,
        entity_id: EntityId,
    },
    Upsert {
        entity_id: EntityId,
        structure: TwinStructure,
    },
    UpdateMetadata {
        entity_id: EntityId,
        update: ChannelMetadataUpdate,
    },
    Publish {
        entity_id: EntityId,
        channel_id: String,
        values: ChannelValues,
        occurred_at: DateTime<Utc>,
    },
    Delete {
        entity_id: EntityId,
    },
    Search {
        properties: Vec<Property>,
        found: usize,
    },
}

impl DirectoryOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            DirectoryOperation::CreateIdentity { .. } => OperationKind::CreateIdentity,
            DirectoryOperation::Upsert { .. } => OperationKind::Upsert,
            DirectoryOperation::UpdateMetadata { .. } => OperationKind::UpdateMetadata,
            DirectoryOperation::Publish { .. } => OperationKind::Publish,
            DirectoryOperation::Delete { .. } => OperationKind::Delete,
            DirectoryOperation::Search { .. } => OperationKind::Search,
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    entities: HashMap<EntityId, TwinStructure>,
    operations: VecDeque<DirectoryOperation>,
    operation_counts: HashMap<OperationKind, u64>,
    failures: HashMap<OperationKind, VecDeque<StatusCode>>,
    tokens: Vec<String>,
}

impl DirectoryState {
    fn record(&mut self, operation: DirectoryOperation, history_limit: usize) {
        *self.operation_counts.entry(operation.kind()).or_default() += 1;
        self.operations.push_back(operation);
        while self.operations.len() > history_limit {
            self.operations.pop_front();
        }
    }
}

#[derive(Debug)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
    history_limit: usize,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_OPERATION_HISTORY)
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `history_limit` calls in [`operations`](Self::operations);
    /// zero keeps counts only
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(DirectoryState::default()),
            history_limit,
        }
    }

    /// Successful calls of `kind` since creation, including trimmed ones
    pub fn operation_count(&self, kind: OperationKind) -> u64 {
        self.state
            .lock()
            .operation_counts
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    /// Fail the next `times` calls of `kind` with `code`
    pub fn fail_next(&self, kind: OperationKind, code: StatusCode, times: usize) {
        let mut state = self.state.lock();
        let queue = state.failures.entry(kind).or_default();
        queue.extend(std::iter::repeat(code).take(times));
    }

    /// Insert a twin directly, bypassing the operation log
    pub fn seed_entity(&self, entity_id: EntityId, structure: TwinStructure) {
        self.state.lock().entities.insert(entity_id, structure);
    }

    /// Retained calls, oldest first
    pub fn operations(&self) -> Vec<DirectoryOperation> {
        self.state.lock().operations.iter().cloned().collect()
    }

    pub fn operations_of(&self, kind: OperationKind) -> Vec<DirectoryOperation> {
        self.state
            .lock()
            .operations
            .iter()
            .filter(|op| op.kind() == kind)
            .cloned()
            .collect()
    }

    /// Publications as `(entity, channel, values, occurred_at)` in call order
    pub fn publications(&self) -> Vec<(EntityId, String, ChannelValues, DateTime<Utc>)> {
        self.state
            .lock()
            .operations
            .iter()
            .filter_map(|op| match op {
                DirectoryOperation::Publish {
                    entity_id,
                    channel_id,
                    values,
                    occurred_at,
                } => Some((
                    entity_id.clone(),
                    channel_id.clone(),
                    values.clone(),
                    *occurred_at,
                )),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.state.lock().entities.contains_key(entity_id)
    }

    pub fn entity(&self, entity_id: &EntityId) -> Option<TwinStructure> {
        self.state.lock().entities.get(entity_id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().entities.len()
    }

    pub fn installed_tokens(&self) -> Vec<String> {
        self.state.lock().tokens.clone()
    }

    fn scripted_failure(state: &mut DirectoryState, kind: OperationKind) -> Result<(), RemoteError> {
        match state.failures.get_mut(&kind).and_then(VecDeque::pop_front) {
            Some(code) => {
                debug!(?kind, %code, "Injected directory failure");
                Err(RemoteError::new(code, format!("injected {kind:?} failure")))
            }
            None => Ok(()),
        }
    }

    fn require_entity(state: &DirectoryState, entity_id: &EntityId) -> Result<(), RemoteError> {
        if state.entities.contains_key(entity_id) {
            Ok(())
        } else {
            Err(RemoteError::not_found(format!("twin {entity_id} does not exist")))
        }
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn create_entity_identity(&self, key_name: &str) -> Result<EntityId, RemoteError> {
        let mut state = self.state.lock();
        Self::scripted_failure(&mut state, OperationKind::CreateIdentity)?;

        let entity_id = EntityId::new(format!("did:replay:{key_name}"));
        state.record(
            DirectoryOperation::CreateIdentity {
                key_name: key_name.to_string(),
                entity_id: entity_id.clone(),
            },
            self.history_limit,
        );
        Ok(entity_id)
    }

    async fn upsert_entity(
        &self,
        entity_id: &EntityId,
        structure: &TwinStructure,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        Self::scripted_failure(&mut state, OperationKind::Upsert)?;

        state.entities.insert(entity_id.clone(), structure.clone());
        state.record(
            DirectoryOperation::Upsert {
                entity_id: entity_id.clone(),
                structure: structure.clone(),
            },
            self.history_limit,
        );
        Ok(())
    }

    async fn update_channel_metadata(
        &self,
        entity_id: &EntityId,
        update: &ChannelMetadataUpdate,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        Self::scripted_failure(&mut state, OperationKind::UpdateMetadata)?;
        Self::require_entity(&state, entity_id)?;

        if let Some(channel) = state
            .entities
            .get_mut(entity_id)
            .and_then(|twin| twin.channels.iter_mut().find(|c| c.channel_id == update.channel_id))
        {
            channel
                .properties
                .retain(|p| !update.property_keys_deleted.contains(&p.key));
            channel.properties.extend(update.properties_added.iter().cloned());
        }

        state.record(
            DirectoryOperation::UpdateMetadata {
                entity_id: entity_id.clone(),
                update: update.clone(),
            },
            self.history_limit,
        );
        Ok(())
    }

    async fn publish_channel_data(
        &self,
        entity_id: &EntityId,
        channel_id: &str,
        values: &ChannelValues,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        Self::scripted_failure(&mut state, OperationKind::Publish)?;
        Self::require_entity(&state, entity_id)?;

        state.record(
            DirectoryOperation::Publish {
                entity_id: entity_id.clone(),
                channel_id: channel_id.to_string(),
                values: values.clone(),
                occurred_at,
            },
            self.history_limit,
        );
        Ok(())
    }

    async fn delete_entity(&self, entity_id: &EntityId) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        Self::scripted_failure(&mut state, OperationKind::Delete)?;
        Self::require_entity(&state, entity_id)?;

        state.entities.remove(entity_id);
        state.record(
            DirectoryOperation::Delete {
                entity_id: entity_id.clone(),
            },
            self.history_limit,
        );
        Ok(())
    }

    async fn search_entities(&self, properties: &[Property]) -> Result<Vec<EntityId>, RemoteError> {
        let mut state = self.state.lock();
        Self::scripted_failure(&mut state, OperationKind::Search)?;

        let mut found: Vec<EntityId> = state
            .entities
            .iter()
            .filter(|(_, twin)| properties.iter().all(|p| twin.has_property(p)))
            .map(|(id, _)| id.clone())
            .collect();
        found.sort();

        state.record(
            DirectoryOperation::Search {
                properties: properties.to_vec(),
                found: found.len(),
            },
            self.history_limit,
        );
        Ok(found)
    }

    fn install_token(&self, token: &str) {
        self.state.lock().tokens.push(token.to_string());
    }
}
