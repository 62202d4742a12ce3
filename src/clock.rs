//! Wall-clock sources for "now" comparisons.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use tokio::time::Instant;

pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from the tokio monotonic clock.
///
/// Anchored to a wall instant at construction and advanced by tokio's
/// `Instant`, so it follows paused or advanced time in tests and never jumps
/// backwards with system clock adjustments.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    wall_anchor: DateTime<Utc>,
    mono_anchor: Instant,
}

impl MonotonicClock {
    pub fn starting_at(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            mono_anchor: Instant::now(),
        }
    }

    pub fn from_system() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono_anchor.elapsed())
            .unwrap_or(chrono::Duration::zero());
        self.wall_anchor + elapsed
    }
}
