use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of delayed action the scheduler can hold for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ArrivalShare,
    DepartureShare,
    MetadataUpdateArrival,
    MetadataUpdateDeparture,
    Deletion,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ArrivalShare => "arrival_share",
            EventKind::DepartureShare => "departure_share",
            EventKind::MetadataUpdateArrival => "metadata_update_arrival",
            EventKind::MetadataUpdateDeparture => "metadata_update_departure",
            EventKind::Deletion => "deletion",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a timer: at most one may be pending per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub entity_key: String,
    pub kind: EventKind,
}

impl EventKey {
    pub fn new(entity_key: impl Into<String>, kind: EventKind) -> Self {
        Self {
            entity_key: entity_key.into(),
            kind,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_key, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub key: EventKey,
    pub fire_at: DateTime<Utc>,
}

impl ScheduledEvent {
    pub fn new(entity_key: impl Into<String>, kind: EventKind, fire_at: DateTime<Utc>) -> Self {
        Self {
            key: EventKey::new(entity_key, kind),
            fire_at,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.key.kind
    }

    pub fn entity_key(&self) -> &str {
        &self.key.entity_key
    }
}

/// What `EventScheduler::schedule` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A timer is now pending; `superseded` is true if it replaced another one
    Pending { superseded: bool },
    /// The fire time had passed, so the action ran before `schedule` returned
    FiredImmediately { superseded: bool },
}

impl ScheduleOutcome {
    pub fn fired_immediately(&self) -> bool {
        matches!(self, ScheduleOutcome::FiredImmediately { .. })
    }

    pub fn superseded(&self) -> bool {
        match self {
            ScheduleOutcome::Pending { superseded } | ScheduleOutcome::FiredImmediately { superseded } => {
                *superseded
            }
        }
    }
}
