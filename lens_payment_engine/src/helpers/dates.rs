use chrono::{DateTime, Days, Utc};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// `start` plus a whole number of days. `None` for negative counts or if the result is out of range.
pub fn add_days(start: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let days = u64::try_from(days).ok()?;
    start.checked_add_days(Days::new(days))
}

/// Whole days from `now` until `end`, rounding any part day up. Zero if `end` has passed.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (end - now).num_seconds().max(0);
    (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}
