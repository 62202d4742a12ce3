//! # Replay Orchestrator
//!
//! Drives the replay: walks the dataset in order, paces itself against the
//! look-ahead window, creates or updates one twin per vessel and hands every
//! delayed side effect to the [`EventScheduler`].
//!
//! ## Per-record flow
//!
//! 1. Shift the record's timestamps by the process-wide calendar offset.
//! 2. Skip it if the shifted ETA is older than the past window (when asked to).
//! 3. Wait until the shifted ETA is inside the future window.
//! 4. Unknown vessel: create its twin and publish `arrived = false` and
//!    `departed = false`. Known vessel: schedule metadata updates for the new
//!    voyage at the shifted ETA and ETD.
//! 5. Schedule `arrived = true` at the shifted ATA and `departed = true` at the
//!    shifted ATD.
//! 6. Schedule deletion a retention window after the later of the two,
//!    superseding any deletion left over from a previous voyage.
//!
//! Step 4 runs under the vessel's lifecycle lock, so a record that arrives
//! while the vessel's deletion is still in flight waits for it and then
//! creates a new twin rather than reusing the one being deleted.

use super::operations::TwinOperations;
use super::registry::EntityRegistry;
use crate::clock::Clock;
use crate::config::{ReplayConfig, ReplayWindowConfig};
use crate::dataset::MovementDataset;
use crate::directory::DirectoryService;
use crate::error::{ReplayError, ReplayResult};
use crate::logging::log_twin_operation;
use crate::models::{
    ChannelMetadataUpdate, EntityHandle, EntityId, EventKind, GeoLocation, MovementRecord,
    ScheduleOutcome, ScheduledEvent, VesselChannel,
};
use crate::resilience::RetryExecutor;
use crate::scheduler::{action, EventAction, EventScheduler};
use crate::time_shift::TimeShift;
use crate::twin_builder::VesselTwinBuilder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one call to [`ReplayOrchestrator::start`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub records_seen: usize,
    pub records_skipped_stale: usize,
    pub records_skipped_malformed: usize,
    pub twins_created: usize,
    pub twins_updated: usize,
    pub events_scheduled: usize,
    pub events_fired_immediately: usize,
}

impl ReplaySummary {
    fn record_outcome(&mut self, outcome: ScheduleOutcome) {
        if outcome.fired_immediately() {
            self.events_fired_immediately += 1;
        } else {
            self.events_scheduled += 1;
        }
    }
}

/// Shifted instants for one record
#[derive(Debug, Clone, Copy)]
struct VoyageTimes {
    eta: DateTime<Utc>,
    ata: DateTime<Utc>,
    etd: DateTime<Utc>,
    atd: DateTime<Utc>,
}

impl VoyageTimes {
    fn shifted(record: &MovementRecord, shift: &TimeShift) -> Self {
        Self {
            eta: shift.shift(record.eta),
            ata: shift.shift(record.ata),
            etd: shift.shift(record.etd),
            atd: shift.shift(record.atd),
        }
    }

    fn deletion_at(&self, retention: chrono::Duration) -> DateTime<Utc> {
        self.ata.max(self.atd) + retention
    }
}

pub struct ReplayOrchestrator {
    run_id: Uuid,
    window: ReplayWindowConfig,
    skip_malformed_records: bool,
    dataset: Arc<MovementDataset>,
    builder: VesselTwinBuilder,
    operations: TwinOperations,
    scheduler: EventScheduler,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ReplayOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayOrchestrator")
            .field("run_id", &self.run_id)
            .field("window", &self.window)
            .field("records", &self.dataset.len())
            .field("time_shift", self.builder.time_shift())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl ReplayOrchestrator {
    /// Build an orchestrator; the calendar offset is fixed here, from `clock`
    pub fn new(
        config: &ReplayConfig,
        dataset: Arc<MovementDataset>,
        directory: Arc<dyn DirectoryService>,
        executor: RetryExecutor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let time_shift = TimeShift::from_config(&config.replay, clock.now());
        let location = GeoLocation {
            lat: config.directory.latitude,
            lon: config.directory.longitude,
        };
        let registry = Arc::new(EntityRegistry::new());
        let run_id = Uuid::new_v4();

        info!(
            run_id = %run_id,
            offset_days = time_shift.offset().num_days(),
            past_window_days = config.replay.past_window_days,
            future_window_days = config.replay.future_window_days,
            retention_window_days = config.replay.retention_window_days,
            "Creating ReplayOrchestrator"
        );

        Self {
            run_id,
            window: config.replay.clone(),
            skip_malformed_records: config.dataset.skip_malformed_records,
            dataset,
            builder: VesselTwinBuilder::new(time_shift, location),
            operations: TwinOperations::new(directory, executor, registry),
            scheduler: EventScheduler::new(Arc::clone(&clock)),
            clock,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn time_shift(&self) -> &TimeShift {
        self.builder.time_shift()
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn entities(&self) -> &Arc<EntityRegistry> {
        self.operations.registry()
    }

    /// Delete twins left over from a previous run
    pub async fn clear_space(&self) -> ReplayResult<usize> {
        self.operations.clear_space().await
    }

    /// Replay the whole dataset. Returns once every record has been processed;
    /// timers scheduled along the way keep running afterwards.
    pub async fn start(&self, skip_past_data: bool) -> ReplayResult<ReplaySummary> {
        info!(
            run_id = %self.run_id,
            records = self.dataset.len(),
            skip_past_data,
            "🚀 Starting vessel movement replay"
        );

        let mut summary = ReplaySummary::default();
        for item in self.dataset.movements() {
            summary.records_seen += 1;

            let record = match item {
                Ok(record) => record,
                Err(ReplayError::DataError { record, reason }) if self.skip_malformed_records => {
                    warn!(record, reason = %reason, "Skipping malformed movement record");
                    summary.records_skipped_malformed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.process_record(&record, skip_past_data, &mut summary)
                .await?;
        }

        info!(
            run_id = %self.run_id,
            records_seen = summary.records_seen,
            twins_created = summary.twins_created,
            twins_updated = summary.twins_updated,
            pending = self.scheduler.pending_count(),
            "✅ Dataset exhausted"
        );
        Ok(summary)
    }

    async fn process_record(
        &self,
        record: &MovementRecord,
        skip_past_data: bool,
        summary: &mut ReplaySummary,
    ) -> ReplayResult<()> {
        let times = VoyageTimes::shifted(record, self.builder.time_shift());
        let entity_key = record.entity_key();
        debug!(entity_key, eta = %times.eta, "Working on movement record");

        if skip_past_data && times.eta < self.clock.now() - self.window.past_window() {
            debug!(entity_key, eta = %times.eta, "Skipping stale movement record");
            summary.records_skipped_stale += 1;
            return Ok(());
        }

        self.wait_for_window(times.eta).await;

        if record.departs_before_arrival() {
            warn!(
                entity_key,
                ata = %times.ata,
                atd = %times.atd,
                "Departure recorded before arrival, replaying as given"
            );
        }

        // A deletion for this vessel that is still running finishes first
        let (handle, reclaimed) = {
            let registry = self.operations.registry();
            let _lifecycle = registry.lock_lifecycle(entity_key).await;
            match registry.claim(entity_key) {
                Some(handle) => (handle, true),
                None => (self.create_twin(record).await?, false),
            }
        };
        let entity_id = &handle.entity_id;

        if reclaimed {
            log_twin_operation(
                "update",
                entity_key,
                Some(entity_id.as_str()),
                "existing",
                Some("scheduling metadata updates for new voyage"),
            );
            self.schedule_metadata_updates(record, entity_id, &times, summary)
                .await?;
            summary.twins_updated += 1;
        } else {
            summary.twins_created += 1;
        }

        let arrival = self
            .schedule(
                ScheduledEvent::new(entity_key, EventKind::ArrivalShare, times.ata),
                self.share_action(entity_key, entity_id, VesselChannel::Arrival, times.ata),
            )
            .await?;
        summary.record_outcome(arrival);

        let departure = self
            .schedule(
                ScheduledEvent::new(entity_key, EventKind::DepartureShare, times.atd),
                self.share_action(entity_key, entity_id, VesselChannel::Departure, times.atd),
            )
            .await?;
        summary.record_outcome(departure);

        let deletion_at = times.deletion_at(self.window.retention_window());
        let deletion = self
            .schedule(
                ScheduledEvent::new(entity_key, EventKind::Deletion, deletion_at),
                self.deletion_action(&handle),
            )
            .await?;
        summary.record_outcome(deletion);

        Ok(())
    }

    /// Block until `target` falls inside the look-ahead window
    async fn wait_for_window(&self, target: DateTime<Utc>) {
        let poll = self.window.throttle_poll_interval();
        let mut announced = false;

        loop {
            let horizon = self.clock.now() + self.window.future_window();
            if target <= horizon {
                return;
            }

            if !announced {
                info!(
                    eta = %target,
                    horizon = %horizon,
                    "⏳ Next record is beyond the look-ahead window, waiting"
                );
                announced = true;
            }

            let remaining = (target - horizon).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(remaining.min(poll)).await;
        }
    }

    async fn create_twin(&self, record: &MovementRecord) -> ReplayResult<EntityHandle> {
        let entity_key = record.entity_key();
        let info = self.dataset.vessel_info(entity_key);
        if info.is_none() {
            warn!(entity_key, "No reference data for vessel, attributes set to Unknown");
        }

        info!(entity_key, "Creating vessel twin...");
        let structure = self.builder.build(record, info);
        let now = self.clock.now();
        let handle = self
            .operations
            .create_twin(entity_key, &structure, now)
            .await?;

        // Both channels start as "not yet occurred"
        for channel in [VesselChannel::Arrival, VesselChannel::Departure] {
            self.operations
                .share_status(&handle.entity_id, channel, false, now)
                .await?;
        }
        Ok(handle)
    }

    async fn schedule_metadata_updates(
        &self,
        record: &MovementRecord,
        entity_id: &EntityId,
        times: &VoyageTimes,
        summary: &mut ReplaySummary,
    ) -> ReplayResult<()> {
        let entity_key = record.entity_key();
        let updates = [
            (
                EventKind::MetadataUpdateArrival,
                times.eta,
                self.builder.arrival_update(record),
            ),
            (
                EventKind::MetadataUpdateDeparture,
                times.etd,
                self.builder.departure_update(record),
            ),
        ];

        for (kind, fire_at, update) in updates {
            let outcome = self
                .schedule(
                    ScheduledEvent::new(entity_key, kind, fire_at),
                    self.update_action(entity_key, entity_id, update),
                )
                .await?;
            summary.record_outcome(outcome);
        }
        Ok(())
    }

    async fn schedule(
        &self,
        event: ScheduledEvent,
        action: EventAction,
    ) -> ReplayResult<ScheduleOutcome> {
        self.scheduler.schedule(event, action).await
    }

    fn share_action(
        &self,
        entity_key: &str,
        entity_id: &EntityId,
        channel: VesselChannel,
        occurred_at: DateTime<Utc>,
    ) -> EventAction {
        let operations = self.operations.clone();
        let entity_key = entity_key.to_string();
        let entity_id = entity_id.clone();
        action(move || async move {
            operations.require_live(&entity_key, &entity_id)?;
            operations
                .share_status(&entity_id, channel, true, occurred_at)
                .await
        })
    }

    fn update_action(
        &self,
        entity_key: &str,
        entity_id: &EntityId,
        update: ChannelMetadataUpdate,
    ) -> EventAction {
        let operations = self.operations.clone();
        let entity_key = entity_key.to_string();
        let entity_id = entity_id.clone();
        action(move || async move {
            operations.require_live(&entity_key, &entity_id)?;
            operations.update_channel(&entity_id, &update).await
        })
    }

    fn deletion_action(&self, handle: &EntityHandle) -> EventAction {
        let operations = self.operations.clone();
        let handle = handle.clone();
        action(move || async move { operations.delete_twin(&handle).await })
    }

    /// Abort every pending timer; returns how many were dropped
    pub fn shutdown(&self) -> usize {
        let aborted = self.scheduler.shutdown();
        info!(run_id = %self.run_id, aborted, "Replay orchestrator shut down");
        aborted
    }
}
