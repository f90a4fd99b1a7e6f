//! Lazy, forward-filling weekly checkpoint series.
//!
//! A [`CheckpointSeries`] answers "what was the value during week W" for past,
//! current and scheduled-future weeks. Values live in an append-only arena
//! indexed by `week - start_week`; the last slot is the working value of
//! [`last_checkpoint`](CheckpointSeries::last_checkpoint).
//!
//! Read rules for `value_during(week, now)`:
//! - `week < start_week` → zero
//! - `week <= last_checkpoint` → the stored value
//! - `last_checkpoint < week <= week_of(now)` → the working value (not yet
//!   materialized, but nothing can have changed it)
//! - `week > week_of(now)` → zero or the working value, per [`FuturePolicy`]
//!
//! Materializing missed weeks costs one slot per week. Both
//! [`checkpoint`](CheckpointSeries::checkpoint) and writes are capped at
//! `max_weeks` per call; a series further behind than that rejects writes
//! with [`SeriesError::CheckpointBehind`] until repeated checkpoints catch it
//! up.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SeriesError;
use crate::time::{week_of, Timestamp, Week};

/// What a series reports for weeks after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FuturePolicy {
    /// Scheduled weeks read zero until they arrive.
    #[default]
    Zero,
    /// Scheduled weeks read the latest known value.
    LastKnown,
}

/// Outcome of a bounded checkpoint call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckpointProgress {
    /// Weeks materialized by this call.
    pub advanced: u64,
    /// Weeks still missing after this call.
    pub behind: u64,
}

impl CheckpointProgress {
    pub fn is_caught_up(&self) -> bool {
        self.behind == 0
    }

    /// Combine the progress of two series checkpointed together.
    pub fn merge(self, other: Self) -> Self {
        Self {
            advanced: self.advanced.max(other.advanced),
            behind: self.behind.max(other.behind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSeries<V> {
    start_week: Week,
    values: Vec<V>,
    policy: FuturePolicy,
    max_weeks: u64,
}

impl<V: Copy + Default> CheckpointSeries<V> {
    /// Create a series whose first bucket is `start_week`, holding zero.
    ///
    /// `max_weeks` caps how many weeks one call may materialize (at least 1).
    pub fn new(start_week: Week, policy: FuturePolicy, max_weeks: u64) -> Self {
        Self {
            start_week,
            values: vec![V::default()],
            policy,
            max_weeks: max_weeks.max(1),
        }
    }

    pub fn start_week(&self) -> Week {
        self.start_week
    }

    /// Latest materialized week; its slot holds the working value.
    pub fn last_checkpoint(&self) -> Week {
        self.start_week + (self.values.len() as u64 - 1)
    }

    pub fn policy(&self) -> FuturePolicy {
        self.policy
    }

    /// The working value: what the series holds right now.
    pub fn current(&self) -> V {
        self.values.last().copied().unwrap_or_default()
    }

    /// Weeks between `last_checkpoint` and the week of `now`.
    pub fn weeks_behind(&self, now: Timestamp) -> u64 {
        week_of(now).saturating_sub(self.last_checkpoint())
    }

    /// Value during `week`, as seen at `now`. Never fails.
    pub fn value_during(&self, week: Week, now: Timestamp) -> V {
        if week < self.start_week {
            return V::default();
        }
        let last = self.last_checkpoint();
        if week <= last {
            return self.values[(week - self.start_week) as usize];
        }
        if week <= week_of(now) {
            return self.current();
        }
        match self.policy {
            FuturePolicy::Zero => V::default(),
            FuturePolicy::LastKnown => self.current(),
        }
    }

    /// Materialize missed weeks up to the week of `now`, at most `max_weeks`.
    ///
    /// Idempotent within a week and never rewinds.
    pub fn checkpoint(&mut self, now: Timestamp) -> CheckpointProgress {
        let target = week_of(now);
        let last = self.last_checkpoint();
        if target <= last {
            return CheckpointProgress::default();
        }
        let gap = target - last;
        let advanced = gap.min(self.max_weeks);
        self.fill(advanced);
        trace!(from = last, advanced, behind = gap - advanced, "series: checkpoint");
        CheckpointProgress {
            advanced,
            behind: gap - advanced,
        }
    }

    /// Set the working value for the current week.
    ///
    /// Writes made before `start_week` land in the `start_week` bucket.
    pub fn record(&mut self, value: V, now: Timestamp) -> Result<(), SeriesError> {
        let gap = self.prepare_write(now)?;
        self.commit(gap, value);
        Ok(())
    }

    /// Read-modify-write of the working value. State is untouched if `f` fails.
    pub fn update<E>(&mut self, now: Timestamp, f: impl FnOnce(V) -> Result<V, E>) -> Result<V, E>
    where
        E: From<SeriesError>,
    {
        let gap = self.prepare_write(now)?;
        let value = f(self.current())?;
        self.commit(gap, value);
        Ok(value)
    }

    /// Check that a write at `now` would be accepted, without writing.
    ///
    /// Lets callers that update several pieces of state validate everything
    /// before mutating anything.
    pub fn check_write(&self, now: Timestamp) -> Result<(), SeriesError> {
        self.prepare_write(now).map(|_| ())
    }

    /// Validate a write at `now`, returning how many weeks must be filled first.
    fn prepare_write(&self, now: Timestamp) -> Result<u64, SeriesError> {
        let week = week_of(now).max(self.start_week);
        let last = self.last_checkpoint();
        if week < last {
            return Err(SeriesError::FrozenWeek {
                week,
                last_checkpoint: last,
            });
        }
        let gap = week - last;
        if gap > self.max_weeks {
            return Err(SeriesError::CheckpointBehind { behind: gap });
        }
        Ok(gap)
    }

    fn commit(&mut self, gap: u64, value: V) {
        self.fill(gap);
        if let Some(slot) = self.values.last_mut() {
            *slot = value;
        }
    }

    fn fill(&mut self, weeks: u64) {
        let carried = self.current();
        self.values
            .extend(std::iter::repeat_n(carried, weeks as usize));
    }
}
