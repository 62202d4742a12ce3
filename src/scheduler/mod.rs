//! # Event Scheduler
//!
//! Registry of named, cancellable delayed actions. Each timer is identified by
//! an [`EventKey`] (entity key + event kind) and at most one may be pending
//! per key: scheduling again cancels and replaces the pending timer.
//!
//! ## Lifecycle per key
//!
//! ```text
//! Unscheduled ──schedule(fire_at > now)──▶ Pending ──elapsed──▶ Fired
//!      │                                     │
//!      └──schedule(fire_at <= now)──▶ Fired  └──cancel / reschedule──▶ Cancelled
//! ```
//!
//! Every timer is a tokio task that sleeps until its fire time, then removes
//! itself from the registry and runs its action. Actions run on their own task,
//! so a slow or failing action never holds up the others. A failed timer
//! action is logged and ends only that task.
//!
//! Cancellation prevents an action that has not started; one that has already
//! left the registry runs to completion.

use crate::clock::Clock;
use crate::error::{ReplayError, ReplayResult};
use crate::logging::{log_error, log_event_operation};
use crate::models::{EventKey, ScheduleOutcome, ScheduledEvent};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Deferred side effect run when an event fires
pub type EventAction = Box<dyn FnOnce() -> BoxFuture<'static, ReplayResult<()>> + Send>;

/// Box an async closure as an [`EventAction`]
pub fn action<F, Fut>(f: F) -> EventAction
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ReplayResult<()>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Counters since the scheduler was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub fired: u64,
    pub fired_immediately: u64,
    pub cancelled: u64,
    pub failed: u64,
}

struct PendingTimer {
    generation: u64,
    fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    fired: AtomicU64,
    fired_immediately: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

#[derive(Default)]
struct SchedulerShared {
    timers: Mutex<HashMap<EventKey, PendingTimer>>,
    next_generation: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
    counters: Counters,
}

impl SchedulerShared {
    fn is_idle(&self) -> bool {
        // in_flight is raised under the timers lock, before the entry disappears
        let timers = self.timers.lock();
        timers.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Remove and abort the pending timer for `key`, if any
    fn take_pending(&self, key: &EventKey) -> Option<DateTime<Utc>> {
        let previous = self.timers.lock().remove(key)?;
        previous.handle.abort();
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        self.idle.notify_waiters();
        Some(previous.fire_at)
    }
}

/// Decrements the in-flight count even if the action panics
struct InFlightGuard(Arc<SchedulerShared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

pub struct EventScheduler {
    shared: Arc<SchedulerShared>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EventScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventScheduler")
            .field("pending", &self.pending_count())
            .field("in_flight", &self.shared.in_flight.load(Ordering::Relaxed))
            .field("clock", &self.clock)
            .finish()
    }
}

impl EventScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(SchedulerShared::default()),
            clock,
        }
    }

    /// Schedule `action` for `event`, replacing any pending timer with the same key.
    ///
    /// If the fire time has already passed the action runs before this returns,
    /// and its error is returned to the caller.
    pub async fn schedule(
        &self,
        event: ScheduledEvent,
        action: EventAction,
    ) -> ReplayResult<ScheduleOutcome> {
        let ScheduledEvent { key, fire_at } = event;
        let delay = fire_at - self.clock.now();

        let delay = match delay.to_std() {
            Ok(delay) if !delay.is_zero() => delay,
            _ => return self.fire_now(key, fire_at, action).await,
        };

        let superseded = {
            let mut timers = self.shared.timers.lock();
            let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
            let handle = tokio::spawn(run_timer(
                Arc::clone(&self.shared),
                key.clone(),
                generation,
                fire_at,
                delay,
                action,
            ));

            timers
                .insert(
                    key.clone(),
                    PendingTimer {
                        generation,
                        fire_at,
                        handle,
                    },
                )
                .map(|previous| {
                    previous.handle.abort();
                    previous.fire_at
                })
        };

        self.shared.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        if let Some(previous_fire_at) = superseded {
            self.shared.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            log_superseded(&key, previous_fire_at);
        }
        log_event_operation(
            "schedule",
            &key.entity_key,
            key.kind.as_str(),
            fire_at,
            "pending",
            None,
        );

        Ok(ScheduleOutcome::Pending {
            superseded: superseded.is_some(),
        })
    }

    async fn fire_now(
        &self,
        key: EventKey,
        fire_at: DateTime<Utc>,
        action: EventAction,
    ) -> ReplayResult<ScheduleOutcome> {
        let superseded = self.shared.take_pending(&key);
        if let Some(previous_fire_at) = superseded {
            log_superseded(&key, previous_fire_at);
        }

        log_event_operation(
            "fire",
            &key.entity_key,
            key.kind.as_str(),
            fire_at,
            "immediate",
            None,
        );

        match action().await {
            Ok(()) => {
                self.shared
                    .counters
                    .fired_immediately
                    .fetch_add(1, Ordering::Relaxed);
                Ok(ScheduleOutcome::FiredImmediately {
                    superseded: superseded.is_some(),
                })
            }
            Err(e) => {
                self.shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    event = %key,
                    operation = e.operation().unwrap_or("event_action"),
                    error = %e,
                    "Immediate event action failed"
                );
                Err(e)
            }
        }
    }

    /// Cancel the pending timer for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &EventKey) -> bool {
        match self.shared.take_pending(key) {
            Some(fire_at) => {
                log_event_operation(
                    "cancel",
                    &key.entity_key,
                    key.kind.as_str(),
                    fire_at,
                    "cancelled",
                    None,
                );
                true
            }
            None => {
                debug!(event = %key, "Cancel requested with no pending timer");
                false
            }
        }
    }

    pub fn is_pending(&self, key: &EventKey) -> bool {
        self.shared.timers.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.timers.lock().len()
    }

    pub fn pending_fire_at(&self, key: &EventKey) -> Option<DateTime<Utc>> {
        self.shared.timers.lock().get(key).map(|t| t.fire_at)
    }

    /// Snapshot of pending events, ordered by fire time
    pub fn pending_events(&self) -> Vec<ScheduledEvent> {
        let mut events: Vec<ScheduledEvent> = self
            .shared
            .timers
            .lock()
            .iter()
            .map(|(key, timer)| ScheduledEvent {
                key: key.clone(),
                fire_at: timer.fire_at,
            })
            .collect();
        events.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.key.cmp(&b.key)));
        events
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.shared.counters;
        SchedulerStats {
            scheduled: counters.scheduled.load(Ordering::Relaxed),
            fired: counters.fired.load(Ordering::Relaxed),
            fired_immediately: counters.fired_immediately.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Resolve once no timer is pending and no timer action is running
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Abort every pending timer. Actions already running are left to finish.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<_> = self.shared.timers.lock().drain().collect();
        for (_, timer) in &drained {
            timer.handle.abort();
        }
        self.shared
            .counters
            .cancelled
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        self.shared.idle.notify_waiters();

        if !drained.is_empty() {
            debug!(aborted = drained.len(), "Scheduler shut down with pending timers");
        }
        drained.len()
    }
}

impl Drop for EventScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.shared.timers.lock().drain() {
            timer.handle.abort();
        }
    }
}

async fn run_timer(
    shared: Arc<SchedulerShared>,
    key: EventKey,
    generation: u64,
    fire_at: DateTime<Utc>,
    delay: std::time::Duration,
    action: EventAction,
) {
    tokio::time::sleep(delay).await;

    let _in_flight = {
        let mut timers = shared.timers.lock();
        // Superseded or cancelled after the sleep elapsed
        if timers.get(&key).map(|t| t.generation) != Some(generation) {
            return;
        }
        timers.remove(&key);
        shared.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&shared))
    };

    log_event_operation(
        "fire",
        &key.entity_key,
        key.kind.as_str(),
        fire_at,
        "timer",
        None,
    );

    match action().await {
        Ok(()) => {
            shared.counters.fired.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            shared.counters.failed.fetch_add(1, Ordering::Relaxed);
            report_timer_failure(&key, &e);
        }
    }
}

fn report_timer_failure(key: &EventKey, error: &ReplayError) {
    let context = format!("{key} timer stopped");
    log_error(
        "scheduler",
        error.operation().unwrap_or("event_action"),
        &error.to_string(),
        Some(&context),
    );
}

fn log_superseded(key: &EventKey, previous_fire_at: DateTime<Utc>) {
    log_event_operation(
        "supersede",
        &key.entity_key,
        key.kind.as_str(),
        previous_fire_at,
        "cancelled",
        Some("replaced by a newer schedule"),
    );
}
