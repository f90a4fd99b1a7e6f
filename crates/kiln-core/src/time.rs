//! Week arithmetic.
//!
//! A week is the 604,800-second bucket `floor(timestamp / WEEK)` counted from
//! the Unix epoch. All schedule state is indexed by week; only lock maturities
//! and weight changes keep second precision.

use crate::constants::WEEK;

/// Week bucket index.
pub type Week = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// The week containing `timestamp`.
pub fn week_of(timestamp: Timestamp) -> Week {
    timestamp / WEEK
}

/// First second of `week`.
pub fn week_start(week: Week) -> Timestamp {
    week.saturating_mul(WEEK)
}

/// Last second of `week`.
pub fn week_end(week: Week) -> Timestamp {
    week_start(week.saturating_add(1)).saturating_sub(1)
}

/// Seconds of `[from, to)` that fall inside `week`.
pub fn seconds_within(week: Week, from: Timestamp, to: Timestamp) -> u64 {
    let lo = from.max(week_start(week));
    let hi = to.min(week_start(week.saturating_add(1)));
    hi.saturating_sub(lo)
}
