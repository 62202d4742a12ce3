use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

/// Any UTC instant between 1990 and 2090, to the second
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (631_152_000i64..3_786_912_000i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

/// Calendar years spanning several leap cycles, including century years
pub fn year_strategy() -> impl Strategy<Value = i32> {
    1896i32..2404
}

/// Shift sizes in days, either direction
pub fn shift_days_strategy() -> impl Strategy<Value = i64> {
    -3_650i64..3_650
}
