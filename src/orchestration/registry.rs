//! Live twins by entity key.
//!
//! A handle is present exactly while its twin exists in the directory: it is
//! inserted once creation completes and removed once deletion completes.
//! Every voyage that takes over a twin stamps a fresh `voyage` number on its
//! handle, so a deletion scheduled by an earlier voyage can tell it no longer
//! owns the twin.
//!
//! Creation, reclaiming and deletion of one key are serialized through
//! [`EntityRegistry::lock_lifecycle`].

use crate::models::EntityHandle;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct EntityRegistry {
    handles: DashMap<String, EntityHandle>,
    lifecycles: DashMap<String, Arc<Mutex<()>>>,
    next_voyage: AtomicU64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_key: &str) -> Option<EntityHandle> {
        self.handles.get(entity_key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, entity_key: &str) -> bool {
        self.handles.contains_key(entity_key)
    }

    /// Wait for exclusive use of `entity_key`'s create/reclaim/delete path
    pub async fn lock_lifecycle(&self, entity_key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .lifecycles
            .entry(entity_key.to_string())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Register a created twin under a fresh voyage; returns the stored handle
    pub fn insert(&self, mut handle: EntityHandle) -> EntityHandle {
        handle.voyage = self.next_voyage();
        self.handles.insert(handle.entity_key.clone(), handle.clone());
        handle
    }

    /// Hand an existing twin to a new voyage
    pub fn claim(&self, entity_key: &str) -> Option<EntityHandle> {
        self.handles.get_mut(entity_key).map(|mut entry| {
            entry.voyage = self.next_voyage();
            entry.value().clone()
        })
    }

    /// Whether `handle` still names the live twin and the latest voyage
    pub fn is_current(&self, handle: &EntityHandle) -> bool {
        self.handles
            .get(&handle.entity_key)
            .is_some_and(|live| Self::same_voyage(&live, handle))
    }

    /// Drop the handle only if it is still `handle`'s twin and voyage
    pub fn remove_if_current(&self, handle: &EntityHandle) -> bool {
        self.handles
            .remove_if(&handle.entity_key, |_, live| Self::same_voyage(live, handle))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn next_voyage(&self) -> u64 {
        self.next_voyage.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn same_voyage(live: &EntityHandle, handle: &EntityHandle) -> bool {
        live.entity_id == handle.entity_id && live.voyage == handle.voyage
    }
}
