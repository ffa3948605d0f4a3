//! Schedule policy: pure functions deciding when a watch is next due.
//!
//! Scheduling is always computed from a concrete completion (or creation)
//! time, never from the previous due time — a watch that was checked late
//! does not try to catch up with a burst of extra checks.

use chrono::{DateTime, TimeDelta, Utc};

/// Due time for a watch that has never been checked.
pub fn first_due(created_at: DateTime<Utc>, period: TimeDelta) -> DateTime<Utc> {
    created_at + period
}

/// Due time after a completed check. Failed checks use the same formula as
/// successful ones; there is no backoff.
pub fn next_due(completed_at: DateTime<Utc>, period: TimeDelta) -> DateTime<Utc> {
    completed_at + period
}

/// A watch period must be strictly positive to be schedulable.
pub fn period_is_valid(period: TimeDelta) -> bool {
    period > TimeDelta::zero()
}
