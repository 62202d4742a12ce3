//! Remote twin operations, each wrapped in the retry executor.
//!
//! `TwinOperations` is cheap to clone so that scheduled actions can own a copy
//! and run on their own task.

use super::registry::EntityRegistry;
use crate::directory::DirectoryService;
use crate::error::{ReplayError, ReplayResult};
use crate::logging::log_twin_operation;
use crate::models::{
    identity_key_name, ChannelMetadataUpdate, EntityHandle, EntityId, TwinStructure,
    VesselChannel,
};
use crate::resilience::RetryExecutor;
use crate::twin_builder::VesselTwinBuilder;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct TwinOperations {
    directory: Arc<dyn DirectoryService>,
    executor: RetryExecutor,
    registry: Arc<EntityRegistry>,
}

impl std::fmt::Debug for TwinOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwinOperations")
            .field("executor", &self.executor)
            .field("live_twins", &self.registry.len())
            .finish()
    }
}

impl TwinOperations {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        executor: RetryExecutor,
        registry: Arc<EntityRegistry>,
    ) -> Self {
        Self {
            directory,
            executor,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Register an identity, upsert the twin, then record its handle
    pub async fn create_twin(
        &self,
        entity_key: &str,
        structure: &TwinStructure,
        created_at: DateTime<Utc>,
    ) -> ReplayResult<EntityHandle> {
        let directory = self.directory.as_ref();
        let key_name = identity_key_name(entity_key);
        let key_name = key_name.as_str();
        debug!(entity_key, key_name, "Using twin key name");

        let entity_id = self
            .executor
            .execute("create_entity_identity", move || {
                directory.create_entity_identity(key_name)
            })
            .await?;

        let id = &entity_id;
        self.executor
            .execute("upsert_entity", move || directory.upsert_entity(id, structure))
            .await?;

        let handle = self
            .registry
            .insert(EntityHandle::new(entity_id.clone(), entity_key, created_at));

        log_twin_operation(
            "create",
            entity_key,
            Some(entity_id.as_str()),
            "created",
            None,
        );
        Ok(handle)
    }

    /// Publish one boolean on `channel`.
    ///
    /// An arrival (`arrived = true`) also resets `departed` to false with the
    /// same timestamp, for vessels returning after an earlier departure.
    pub async fn share_status(
        &self,
        entity_id: &EntityId,
        channel: VesselChannel,
        occurred: bool,
        occurred_at: DateTime<Utc>,
    ) -> ReplayResult<()> {
        self.publish(entity_id, channel, occurred, occurred_at).await?;

        if channel == VesselChannel::Arrival && occurred {
            self.publish(entity_id, VesselChannel::Departure, false, occurred_at)
                .await?;
        }
        Ok(())
    }

    async fn publish(
        &self,
        entity_id: &EntityId,
        channel: VesselChannel,
        occurred: bool,
        occurred_at: DateTime<Utc>,
    ) -> ReplayResult<()> {
        let directory = self.directory.as_ref();
        let values = channel.values(occurred);
        let values = &values;

        self.executor
            .execute("publish_channel_data", move || {
                directory.publish_channel_data(entity_id, channel.channel_id(), values, occurred_at)
            })
            .await?;

        info!(
            entity_id = %entity_id,
            channel = %channel,
            value = occurred,
            occurred_at = %occurred_at.to_rfc3339(),
            "📡 Shared channel data"
        );
        Ok(())
    }

    pub async fn update_channel(
        &self,
        entity_id: &EntityId,
        update: &ChannelMetadataUpdate,
    ) -> ReplayResult<()> {
        let directory = self.directory.as_ref();
        self.executor
            .execute("update_channel_metadata", move || {
                directory.update_channel_metadata(entity_id, update)
            })
            .await?;

        info!(
            entity_id = %entity_id,
            channel = %update.channel_id,
            properties = update.properties_added.len(),
            "📝 Channel metadata updated"
        );
        Ok(())
    }

    /// Delete the twin `handle` was issued for, then clear the handle.
    ///
    /// Holds the key's lifecycle lock throughout, so a record for the same
    /// vessel arriving mid-delete waits and then creates a fresh twin. A
    /// handle outdated by a later voyage is left alone.
    pub async fn delete_twin(&self, handle: &EntityHandle) -> ReplayResult<()> {
        let entity_key = handle.entity_key.as_str();
        let entity_id = &handle.entity_id;
        let _lifecycle = self.registry.lock_lifecycle(entity_key).await;

        if !self.registry.is_current(handle) {
            log_twin_operation(
                "delete",
                entity_key,
                Some(entity_id.as_str()),
                "skipped",
                Some("twin taken over by a later voyage"),
            );
            return Ok(());
        }

        let directory = self.directory.as_ref();
        self.executor
            .execute("delete_entity", move || directory.delete_entity(entity_id))
            .await?;

        self.registry.remove_if_current(handle);
        log_twin_operation("delete", entity_key, Some(entity_id.as_str()), "deleted", None);
        Ok(())
    }

    /// Fail unless `entity_id` is still the live twin for `entity_key`
    pub fn require_live(&self, entity_key: &str, entity_id: &EntityId) -> ReplayResult<()> {
        match self.registry.get(entity_key) {
            Some(handle) if handle.entity_id == *entity_id => Ok(()),
            Some(handle) => Err(ReplayError::Scheduling(format!(
                "{entity_key} now maps to {}, not {entity_id}",
                handle.entity_id
            ))),
            None => Err(ReplayError::Scheduling(format!(
                "no live twin for {entity_key} ({entity_id})"
            ))),
        }
    }

    /// Delete every twin left behind by an earlier run; returns how many
    pub async fn clear_space(&self) -> ReplayResult<usize> {
        let directory = self.directory.as_ref();
        let criteria = VesselTwinBuilder::search_criteria();
        let criteria = criteria.as_slice();

        info!("🔍 Searching for vessel twins...");
        let found = self
            .executor
            .execute("search_entities", move || directory.search_entities(criteria))
            .await?;
        info!(found = found.len(), "Found vessel twins from a previous run");

        for entity_id in &found {
            self.executor
                .execute("delete_entity", move || directory.delete_entity(entity_id))
                .await?;
            debug!(entity_id = %entity_id, "Vessel twin deleted");
        }

        info!(deleted = found.len(), "🧹 Cleared vessel twins");
        Ok(found.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialGate;
    use crate::directory::{InMemoryDirectory, OperationKind};
    use crate::resilience::RetryPolicy;

    fn operations(directory: Arc<InMemoryDirectory>) -> TwinOperations {
        TwinOperations::new(
            directory,
            RetryExecutor::new(RetryPolicy::default(), CredentialGate::new()),
            Arc::new(EntityRegistry::new()),
        )
    }

    fn structure() -> TwinStructure {
        TwinStructure {
            properties: Vec::new(),
            location: None,
            channels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_deletion_from_earlier_voyage_leaves_reclaimed_twin() {
        let directory = Arc::new(InMemoryDirectory::new());
        let operations = operations(directory.clone());

        let first = operations
            .create_twin("Normandie", &structure(), Utc::now())
            .await
            .unwrap();
        let second = operations.registry().claim("Normandie").unwrap();
        assert_eq!(first.entity_id, second.entity_id);

        operations.delete_twin(&first).await.unwrap();
        assert!(directory.contains(&first.entity_id));
        assert_eq!(directory.operation_count(OperationKind::Delete), 0);
        assert!(operations
            .require_live("Normandie", &second.entity_id)
            .is_ok());

        operations.delete_twin(&second).await.unwrap();
        assert!(!directory.contains(&second.entity_id));
        assert!(operations.registry().is_empty());
        assert!(operations
            .require_live("Normandie", &second.entity_id)
            .is_err());
    }
}
