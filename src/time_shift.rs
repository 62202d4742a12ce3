//! Calendar offset applied to historical timestamps.
//!
//! The offset is fixed for the lifetime of the process: computed once at
//! startup, then added to every timestamp read from the dataset.

use crate::config::ReplayWindowConfig;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeShift {
    offset: Duration,
}

impl TimeShift {
    /// Replay at the original instants
    pub fn none() -> Self {
        Self {
            offset: Duration::zero(),
        }
    }

    /// Fixed shift of `days`, clamped to the configurable range
    pub fn from_days(days: i64) -> Self {
        let max = crate::constants::MAX_CONFIGURED_DAYS;
        Self {
            offset: Duration::days(days.clamp(-max, max)),
        }
    }

    /// One calendar year for `year`: 366 days in a leap year, 365 otherwise
    pub fn one_year_for(year: i32) -> Self {
        Self::from_days(if is_leap_year(year) { 366 } else { 365 })
    }

    pub fn one_year_from(now: DateTime<Utc>) -> Self {
        Self::one_year_for(now.year())
    }

    /// Offset selected by configuration; an explicit day count wins
    pub fn from_config(config: &ReplayWindowConfig, now: DateTime<Utc>) -> Self {
        match config.shift_days {
            Some(days) => Self::from_days(days),
            None if config.shift_one_year => Self::one_year_from(now),
            None => Self::none(),
        }
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// `timestamp + offset`, saturating at the representable range
    pub fn shift(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        timestamp
            .checked_add_signed(self.offset)
            .unwrap_or(if self.offset < Duration::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }
}

impl Default for TimeShift {
    fn default() -> Self {
        Self::none()
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}
