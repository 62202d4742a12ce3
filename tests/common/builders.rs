//! Fixture builders for replay integration tests.
//!
//! Every harness runs against an [`InMemoryDirectory`] and a
//! [`MonotonicClock`] anchored at [`anchor`], so tests written with
//! `#[tokio::test(start_paused = true)]` can advance simulated days instantly.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use vessel_replay::clock::{Clock, MonotonicClock};
use vessel_replay::config::ReplayConfig;
use vessel_replay::credentials::CredentialGate;
use vessel_replay::dataset::MovementDataset;
use vessel_replay::directory::InMemoryDirectory;
use vessel_replay::models::{EventKey, EventKind, MovementRecord, VesselInfo};
use vessel_replay::orchestration::ReplayOrchestrator;
use vessel_replay::resilience::{RetryExecutor, RetryPolicy};

/// Simulated "now" at the start of every harness
pub fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Config with no calendar shift and a coarse throttle poll, so paused-time
/// tests don't spin through millions of one-second polls.
pub fn test_config() -> ReplayConfig {
    let mut config = ReplayConfig::default();
    config.replay.shift_one_year = false;
    config.replay.shift_days = Some(0);
    config.replay.throttle_poll_interval_ms = 60_000;
    config.replay.clear_on_start = false;
    config
}

/// Builder for a single voyage, timed relative to [`anchor`]
pub struct VoyageBuilder {
    ship_name: String,
    arrival: DateTime<Utc>,
    stay: Duration,
    arrival_delay: Duration,
    berth: Option<String>,
}

impl VoyageBuilder {
    /// Voyage arriving `offset` after the anchor, staying two hours
    pub fn new(ship_name: &str, offset: Duration) -> Self {
        Self {
            ship_name: ship_name.to_string(),
            arrival: anchor() + offset,
            stay: Duration::hours(2),
            arrival_delay: Duration::zero(),
            berth: Some("1".to_string()),
        }
    }

    pub fn staying(mut self, stay: Duration) -> Self {
        self.stay = stay;
        self
    }

    /// Actual arrival and departure run `delay` behind the estimates
    pub fn delayed_by(mut self, delay: Duration) -> Self {
        self.arrival_delay = delay;
        self
    }

    pub fn at_berth(mut self, berth: &str) -> Self {
        self.berth = Some(berth.to_string());
        self
    }

    pub fn build(self) -> MovementRecord {
        let eta = self.arrival;
        let etd = eta + self.stay;
        MovementRecord {
            ship_name: self.ship_name,
            eta,
            ata: eta + self.arrival_delay,
            etd,
            atd: etd + self.arrival_delay,
            berth: self.berth,
            port_of_origin_code: Some("FRCER".to_string()),
            port_of_origin_name: Some("Cherbourg".to_string()),
            location_from: Some("Sea".to_string()),
            port_of_destination_code: Some("FRCER".to_string()),
            port_of_destination_name: Some("Cherbourg".to_string()),
            location_to: Some("Sea".to_string()),
        }
    }
}

pub fn voyage(ship_name: &str, offset: Duration) -> MovementRecord {
    VoyageBuilder::new(ship_name, offset).build()
}

pub fn vessel(ship_name: &str) -> VesselInfo {
    VesselInfo {
        ship_name: ship_name.to_string(),
        vessel_type: Some("Ro-Ro Passenger".to_string()),
        nationality: Some("France".to_string()),
        lrn: Some("9238337".to_string()),
        ..Default::default()
    }
}

pub fn key(ship_name: &str, kind: EventKind) -> EventKey {
    EventKey::new(ship_name, kind)
}

/// Orchestrator wired to an in-memory directory and a paused-time clock
pub struct ReplayHarness {
    pub directory: Arc<InMemoryDirectory>,
    pub clock: Arc<MonotonicClock>,
    pub orchestrator: Arc<ReplayOrchestrator>,
}

impl ReplayHarness {
    pub fn new(records: Vec<MovementRecord>) -> Self {
        Self::with_config(records, &test_config())
    }

    pub fn with_config(records: Vec<MovementRecord>, config: &ReplayConfig) -> Self {
        let vessels = records.iter().map(|r| vessel(&r.ship_name)).collect();
        Self::with_dataset(MovementDataset::new(records, vessels), config)
    }

    pub fn with_dataset(dataset: MovementDataset, config: &ReplayConfig) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(MonotonicClock::starting_at(anchor()));
        let executor = RetryExecutor::new(RetryPolicy::from(&config.retry), CredentialGate::new());

        let orchestrator = Arc::new(ReplayOrchestrator::new(
            config,
            Arc::new(dataset),
            directory.clone(),
            executor,
            clock.clone(),
        ));

        Self {
            directory,
            clock,
            orchestrator,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Advance simulated time until `at`, letting due timers run
    pub async fn advance_to(&self, at: DateTime<Utc>) {
        if let Ok(remaining) = (at - self.now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
        // Let timer tasks woken by the sleep finish their remote calls
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    /// Values published on `channel_id` across all twins, in call order
    pub fn published(&self, channel_id: &str) -> Vec<(bool, DateTime<Utc>)> {
        self.directory
            .publications()
            .into_iter()
            .filter(|(_, channel, _, _)| channel == channel_id)
            .filter_map(|(_, _, values, at)| {
                values.values().next().and_then(|v| v.as_bool()).map(|v| (v, at))
            })
            .collect()
    }
}
