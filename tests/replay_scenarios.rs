//! End-to-end replay scenarios against the in-memory directory.
//!
//! All tests run on paused tokio time: sleeps complete as soon as the runtime
//! is otherwise idle, so multi-day replays finish instantly.

mod common;

use chrono::Duration;
use common::*;
use vessel_replay::constants::ontology;
use vessel_replay::dataset::MovementDataset;
use vessel_replay::directory::{OperationKind, StatusCode};
use vessel_replay::models::{EntityId, EventKind, Property, TwinStructure};
use vessel_replay::twin_builder::VesselTwinBuilder;
use vessel_replay::ReplayError;

const ARRIVAL: &str = "arrival";
const DEPARTURE: &str = "departure";

#[tokio::test(start_paused = true)]
async fn test_new_vessel_is_created_with_both_channels_unset() {
    let harness = ReplayHarness::new(vec![voyage("Mont St Michel", Duration::days(2))]);
    let now = harness.now();

    let summary = harness.orchestrator.start(true).await.unwrap();

    assert_eq!(summary.records_seen, 1);
    assert_eq!(summary.twins_created, 1);
    assert_eq!(summary.events_scheduled, 3);
    assert_eq!(harness.directory.entity_count(), 1);
    assert_eq!(harness.published(ARRIVAL), vec![(false, now)]);
    assert_eq!(harness.published(DEPARTURE), vec![(false, now)]);

    let scheduler = harness.orchestrator.scheduler();
    assert_eq!(
        scheduler.pending_fire_at(&key("Mont St Michel", EventKind::ArrivalShare)),
        Some(anchor() + Duration::days(2))
    );
    assert_eq!(
        scheduler.pending_fire_at(&key("Mont St Michel", EventKind::DepartureShare)),
        Some(anchor() + Duration::days(2) + Duration::hours(2))
    );
    assert_eq!(
        scheduler.pending_fire_at(&key("Mont St Michel", EventKind::Deletion)),
        Some(anchor() + Duration::days(5) + Duration::hours(2))
    );
}

#[tokio::test(start_paused = true)]
async fn test_shares_fire_at_shifted_actual_times() {
    let record = VoyageBuilder::new("Normandie", Duration::hours(6))
        .delayed_by(Duration::minutes(10))
        .build();
    let harness = ReplayHarness::new(vec![record]);

    harness.orchestrator.start(true).await.unwrap();

    let arrived_at = anchor() + Duration::hours(6) + Duration::minutes(10);
    harness.advance_to(arrived_at + Duration::seconds(1)).await;
    assert_eq!(
        harness.published(ARRIVAL),
        vec![(false, anchor()), (true, arrived_at)]
    );
    // Arrival also resets the departure flag with the same timestamp
    assert_eq!(
        harness.published(DEPARTURE),
        vec![(false, anchor()), (false, arrived_at)]
    );

    let departed_at = arrived_at + Duration::hours(2);
    harness.advance_to(departed_at + Duration::seconds(1)).await;
    assert_eq!(harness.published(DEPARTURE).last(), Some(&(true, departed_at)));
    assert_eq!(harness.directory.entity_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_twin_is_deleted_after_retention_window() {
    let harness = ReplayHarness::new(vec![voyage("Commodore Goodwill", Duration::hours(1))]);

    harness.orchestrator.start(true).await.unwrap();
    harness.orchestrator.scheduler().wait_until_idle().await;

    let deletes = harness.directory.operations_of(OperationKind::Delete);
    assert_eq!(deletes.len(), 1);
    assert_eq!(harness.directory.entity_count(), 0);
    assert!(harness.orchestrator.entities().is_empty());
    assert!(harness.now() >= anchor() + Duration::days(3) + Duration::hours(3));
}

#[tokio::test(start_paused = true)]
async fn test_second_voyage_supersedes_pending_deletion() {
    let harness = ReplayHarness::new(vec![
        voyage("Normandie", Duration::hours(1)),
        voyage("Normandie", Duration::days(5)),
    ]);
    let orchestrator = harness.orchestrator.clone();
    let replay = tokio::spawn(async move { orchestrator.start(true).await });

    // The second voyage is admitted two days in, after the first one is done
    harness
        .advance_to(anchor() + Duration::days(2) + Duration::minutes(5))
        .await;
    let summary = replay.await.unwrap().unwrap();
    assert_eq!(summary.twins_created, 1);
    assert_eq!(summary.twins_updated, 1);

    let scheduler = harness.orchestrator.scheduler();
    assert_eq!(
        scheduler.pending_fire_at(&key("Normandie", EventKind::Deletion)),
        Some(anchor() + Duration::days(8) + Duration::hours(2))
    );
    assert!(scheduler.is_pending(&key("Normandie", EventKind::MetadataUpdateArrival)));
    assert!(scheduler.is_pending(&key("Normandie", EventKind::MetadataUpdateDeparture)));

    scheduler.wait_until_idle().await;

    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 1);
    assert_eq!(harness.directory.operations_of(OperationKind::UpdateMetadata).len(), 2);
    assert_eq!(harness.directory.operations_of(OperationKind::CreateIdentity).len(), 1);

    let arrivals: Vec<_> = harness
        .published(ARRIVAL)
        .into_iter()
        .filter(|(arrived, _)| *arrived)
        .map(|(_, at)| at)
        .collect();
    assert_eq!(
        arrivals,
        vec![anchor() + Duration::hours(1), anchor() + Duration::days(5)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_voyages_keep_one_timer_per_kind() {
    let harness = ReplayHarness::new(vec![
        voyage("Mont St Michel", Duration::hours(1)),
        voyage("Mont St Michel", Duration::days(1)),
    ]);

    harness.orchestrator.start(true).await.unwrap();

    let scheduler = harness.orchestrator.scheduler();
    let pending = scheduler.pending_events();
    assert_eq!(pending.len(), 5);
    assert_eq!(
        scheduler.pending_fire_at(&key("Mont St Michel", EventKind::ArrivalShare)),
        Some(anchor() + Duration::days(1))
    );
    assert_eq!(
        scheduler.pending_fire_at(&key("Mont St Michel", EventKind::Deletion)),
        Some(anchor() + Duration::days(4) + Duration::hours(2))
    );
    assert_eq!(scheduler.stats().cancelled, 3);

    scheduler.wait_until_idle().await;
    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_records_beyond_future_window_are_throttled() {
    let harness = ReplayHarness::new(vec![voyage("Pont-Aven", Duration::days(10))]);
    let orchestrator = harness.orchestrator.clone();
    let replay = tokio::spawn(async move { orchestrator.start(true).await });

    harness.advance_to(anchor() + Duration::hours(1)).await;
    assert_eq!(harness.directory.entity_count(), 0);

    harness
        .advance_to(anchor() + Duration::days(7) - Duration::minutes(1))
        .await;
    assert_eq!(harness.directory.entity_count(), 0);
    assert!(!replay.is_finished());

    harness
        .advance_to(anchor() + Duration::days(7) + Duration::minutes(2))
        .await;
    assert_eq!(harness.directory.entity_count(), 1);

    let summary = replay.await.unwrap().unwrap();
    assert_eq!(summary.twins_created, 1);
    assert_eq!(
        harness
            .orchestrator
            .scheduler()
            .pending_fire_at(&key("Pont-Aven", EventKind::ArrivalShare)),
        Some(anchor() + Duration::days(10))
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_with_backoff() {
    let harness = ReplayHarness::new(vec![voyage("Normandie", Duration::hours(1))]);
    harness
        .directory
        .fail_next(OperationKind::CreateIdentity, StatusCode::Unavailable, 2);

    let started = tokio::time::Instant::now();
    let summary = harness.orchestrator.start(true).await.unwrap();

    assert_eq!(started.elapsed(), std::time::Duration::from_secs(4));
    assert_eq!(summary.twins_created, 1);
    assert_eq!(
        harness
            .directory
            .operations_of(OperationKind::CreateIdentity)
            .len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_abort_the_replay() {
    let harness = ReplayHarness::new(vec![
        voyage("Normandie", Duration::hours(1)),
        voyage("Mont St Michel", Duration::hours(2)),
    ]);
    harness
        .directory
        .fail_next(OperationKind::Upsert, StatusCode::Unauthenticated, 3);

    let error = harness.orchestrator.start(true).await.unwrap_err();

    match error {
        ReplayError::RetriesExhausted {
            operation,
            attempts,
            last_error,
        } => {
            assert_eq!(operation, "upsert_entity");
            assert_eq!(attempts, 3);
            assert_eq!(last_error.code, StatusCode::Unauthenticated);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(harness.orchestrator.entities().is_empty());
    assert_eq!(harness.orchestrator.scheduler().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_is_not_retried() {
    let harness = ReplayHarness::new(vec![voyage("Normandie", Duration::hours(1))]);
    harness
        .directory
        .fail_next(OperationKind::CreateIdentity, StatusCode::PermissionDenied, 1);

    let started = tokio::time::Instant::now();
    let error = harness.orchestrator.start(true).await.unwrap_err();

    assert!(matches!(error, ReplayError::RemoteFatal { .. }));
    assert_eq!(error.operation(), Some("create_entity_identity"));
    assert_eq!(started.elapsed(), std::time::Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_failed_timer_does_not_affect_other_timers() {
    let harness = ReplayHarness::new(vec![voyage("Normandie", Duration::hours(1))]);
    harness.orchestrator.start(true).await.unwrap();

    harness
        .directory
        .fail_next(OperationKind::Publish, StatusCode::InvalidArgument, 1);
    harness.orchestrator.scheduler().wait_until_idle().await;

    let stats = harness.orchestrator.scheduler().stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.fired, 2);
    assert_eq!(harness.published(DEPARTURE).last().map(|(v, _)| *v), Some(true));
    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_records_are_skipped_when_requested() {
    let harness = ReplayHarness::new(vec![
        voyage("Normandie", -Duration::days(4)),
        voyage("Mont St Michel", -Duration::days(2)),
    ]);

    let summary = harness.orchestrator.start(true).await.unwrap();

    assert_eq!(summary.records_seen, 2);
    assert_eq!(summary.records_skipped_stale, 1);
    assert_eq!(summary.twins_created, 1);
    assert!(harness.orchestrator.entities().contains("Mont St Michel"));
    assert!(!harness.orchestrator.entities().contains("Normandie"));
}

#[tokio::test(start_paused = true)]
async fn test_past_records_fire_immediately_when_included() {
    let harness = ReplayHarness::new(vec![voyage("Normandie", -Duration::days(4))]);

    let summary = harness.orchestrator.start(false).await.unwrap();

    assert_eq!(summary.records_skipped_stale, 0);
    assert_eq!(summary.twins_created, 1);
    assert_eq!(summary.events_fired_immediately, 3);
    assert_eq!(summary.events_scheduled, 0);
    assert_eq!(harness.orchestrator.scheduler().pending_count(), 0);

    // Shares were published with their historical occurrence times
    let arrived_at = anchor() - Duration::days(4);
    assert!(harness.published(ARRIVAL).contains(&(true, arrived_at)));
    assert!(harness
        .published(DEPARTURE)
        .contains(&(true, arrived_at + Duration::hours(2))));

    // Deletion was already due as well
    assert_eq!(harness.directory.entity_count(), 0);
    assert!(harness.orchestrator.entities().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_vessel_is_recreated_after_its_twin_was_deleted() {
    let harness = ReplayHarness::new(vec![
        voyage("Normandie", Duration::hours(1)),
        voyage("Normandie", Duration::days(7)),
    ]);
    let orchestrator = harness.orchestrator.clone();
    let replay = tokio::spawn(async move { orchestrator.start(true).await });

    // First twin is deleted at +3d3h; the second voyage is admitted at +4d
    harness
        .advance_to(anchor() + Duration::days(4) + Duration::minutes(5))
        .await;
    let summary = replay.await.unwrap().unwrap();

    assert_eq!(summary.twins_created, 2);
    assert_eq!(summary.twins_updated, 0);
    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 1);
    assert_eq!(
        harness
            .directory
            .operations_of(OperationKind::CreateIdentity)
            .len(),
        2
    );
    assert_eq!(harness.directory.entity_count(), 1);

    let handle = harness.orchestrator.entities().get("Normandie").unwrap();
    assert!(handle.created_at >= anchor() + Duration::days(4));
}

#[tokio::test(start_paused = true)]
async fn test_record_arriving_mid_deletion_gets_a_fresh_twin() {
    // First twin's deletion fires at +3d3h; two transient failures stretch the
    // delete to +3d3h4s. The second voyage is admitted at +3d3h2s, mid-delete.
    let second_eta = anchor() + Duration::days(6) + Duration::hours(3) + Duration::seconds(2);
    let harness = ReplayHarness::new(vec![
        voyage("Normandie", Duration::hours(1)),
        voyage("Normandie", second_eta - anchor()),
    ]);
    harness
        .directory
        .fail_next(OperationKind::Delete, StatusCode::Unavailable, 2);

    let orchestrator = harness.orchestrator.clone();
    let replay = tokio::spawn(async move { orchestrator.start(true).await });

    harness
        .advance_to(anchor() + Duration::days(3) + Duration::hours(3) + Duration::seconds(3))
        .await;
    // The second record waits for the delete instead of reusing the old twin
    assert!(!replay.is_finished());
    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 0);
    assert_eq!(
        harness
            .directory
            .operations_of(OperationKind::CreateIdentity)
            .len(),
        1
    );

    harness
        .advance_to(second_eta + Duration::minutes(1))
        .await;
    let summary = replay.await.unwrap().unwrap();

    assert_eq!(summary.twins_created, 2);
    assert_eq!(summary.twins_updated, 0);
    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 1);
    assert_eq!(harness.directory.entity_count(), 1);

    let handle = harness.orchestrator.entities().get("Normandie").unwrap();
    assert!(handle.created_at >= anchor() + Duration::days(3) + Duration::hours(3));
    assert!(harness.published(ARRIVAL).contains(&(true, second_eta)));

    let scheduler = harness.orchestrator.scheduler();
    assert_eq!(scheduler.stats().failed, 0);
    assert!(scheduler.is_pending(&key("Normandie", EventKind::DepartureShare)));
    assert!(scheduler.is_pending(&key("Normandie", EventKind::Deletion)));
}

#[tokio::test(start_paused = true)]
async fn test_pending_timers_stay_bounded_by_window() {
    let records: Vec<_> = (0..20)
        .map(|i| voyage(&format!("Vessel {i:02}"), Duration::hours(1 + 12 * i)))
        .collect();
    let retention = Duration::days(3);
    let timelines: Vec<_> = records
        .iter()
        .map(|r| (r.eta, [r.ata, r.atd, r.ata.max(r.atd) + retention]))
        .collect();

    let harness = ReplayHarness::new(records);
    let orchestrator = harness.orchestrator.clone();
    let replay = tokio::spawn(async move { orchestrator.start(true).await });

    // Event times fall on odd hours and samples on multiples of six, so no
    // timer is due exactly at a sample
    for step in 0..60 {
        harness
            .advance_to(anchor() + Duration::hours(6 * step))
            .await;

        let now = harness.now();
        let horizon = now + Duration::days(3);
        let admitted: Vec<_> = timelines.iter().filter(|(eta, _)| *eta <= horizon).collect();
        let expected: usize = admitted
            .iter()
            .map(|(_, fire_times)| fire_times.iter().filter(|at| **at > now).count())
            .sum();
        let pending = harness.orchestrator.scheduler().pending_count();

        assert_eq!(
            pending,
            expected,
            "timers pending at {now} for {} admitted records",
            admitted.len()
        );
        assert!(pending <= 3 * admitted.len());
    }

    let summary = replay.await.unwrap().unwrap();
    assert_eq!(summary.twins_created, 20);
}

#[tokio::test(start_paused = true)]
async fn test_one_year_shift_uses_leap_year_length() {
    let mut config = test_config();
    config.replay.shift_days = None;
    config.replay.shift_one_year = true;

    // Anchor is in 2024, so the historical record is moved by 366 days
    let historical = voyage("Normandie", Duration::days(1) - Duration::days(366));
    let harness = ReplayHarness::with_config(vec![historical], &config);

    assert_eq!(
        harness.orchestrator.time_shift().offset(),
        Duration::days(366)
    );
    harness.orchestrator.start(true).await.unwrap();

    assert_eq!(
        harness
            .orchestrator
            .scheduler()
            .pending_fire_at(&key("Normandie", EventKind::ArrivalShare)),
        Some(anchor() + Duration::days(1))
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_rows_skipped_or_fatal() {
    let movements = "\
Ship Name,ETA,ATA,ETD,ATD,Berth,Port Origin Code,Port Origin Name,PiP area location from,Port Destination Code,Port Destination Name,PiP area location to
Normandie,02/05/2024 07:15,02/05/2024 07:20,02/05/2024 09:00,02/05/2024 09:12,3,FRCFR,Caen,,FRCFR,Caen,
Mont St Michel,not a date,02/05/2024 08:00,02/05/2024 10:00,02/05/2024 10:05,2,FRCFR,Caen,,FRCFR,Caen,
";
    let vessels = "\
Ship Name,Abbreviation,Type,Co. Reference,LOA,Beam,Draught,Grt,Net Tonnag,Port Of Registration,Date of Registration,Nationality,Dead Weight,LRN
NORMANDIE,NOR,Ro-Ro Passenger,BF,161.4,26,5.5,27541,8262,Caen,1992,French,3900,9006253
";
    let dataset = || {
        MovementDataset::from_readers(movements.as_bytes(), vessels.as_bytes(), "%d/%m/%Y %H:%M")
            .unwrap()
    };

    let mut config = test_config();
    config.dataset.skip_malformed_records = true;
    let lenient = ReplayHarness::with_dataset(dataset(), &config);
    let summary = lenient.orchestrator.start(true).await.unwrap();
    assert_eq!(summary.records_seen, 2);
    assert_eq!(summary.records_skipped_malformed, 1);
    assert_eq!(summary.twins_created, 1);

    config.dataset.skip_malformed_records = false;
    let strict = ReplayHarness::with_dataset(dataset(), &config);
    let error = strict.orchestrator.start(true).await.unwrap_err();
    assert!(matches!(error, ReplayError::DataError { record: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_vessel_without_reference_data_gets_unknown_attributes() {
    let dataset = MovementDataset::new(vec![voyage("Barfleur", Duration::hours(3))], vec![]);
    let harness = ReplayHarness::with_dataset(dataset, &test_config());

    harness.orchestrator.start(true).await.unwrap();

    let handle = harness.orchestrator.entities().get("Barfleur").unwrap();
    let twin = harness.directory.entity(&handle.entity_id).unwrap();
    assert!(twin.has_property(&Property::literal(
        ontology::key(ontology::VESSEL_TYPE),
        "Unknown"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_clear_space_removes_twins_from_previous_run() {
    let harness = ReplayHarness::new(vec![]);
    let leftover = TwinStructure {
        properties: VesselTwinBuilder::search_criteria(),
        location: None,
        channels: vec![],
    };
    harness
        .directory
        .seed_entity(EntityId::new("did:replay:old_1"), leftover.clone());
    harness
        .directory
        .seed_entity(EntityId::new("did:replay:old_2"), leftover);
    harness.directory.seed_entity(
        EntityId::new("did:replay:unrelated"),
        TwinStructure {
            properties: vec![Property::literal("kind", "crane")],
            location: None,
            channels: vec![],
        },
    );

    let deleted = harness.orchestrator.clear_space().await.unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(harness.directory.entity_count(), 1);
    assert!(harness
        .directory
        .contains(&EntityId::new("did:replay:unrelated")));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drops_pending_events() {
    let harness = ReplayHarness::new(vec![voyage("Normandie", Duration::days(1))]);
    harness.orchestrator.start(true).await.unwrap();

    assert_eq!(harness.orchestrator.shutdown(), 3);
    harness.orchestrator.scheduler().wait_until_idle().await;

    assert_eq!(harness.directory.operations_of(OperationKind::Delete).len(), 0);
    assert_eq!(harness.published(ARRIVAL).len(), 1);
}
