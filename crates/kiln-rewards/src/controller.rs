//! Weekly emission budgets.
//!
//! Each week moves through two states:
//! - pending: not yet finalized, every read returns zero
//! - finalized: frozen by [`RewardController::checkpoint`] once the week is
//!   over, fixed forever
//!
//! The budget of week `w` is a fraction of the supply circulating during
//! `w - 1` (total supply minus what the vault has locked):
//!
//! ```text
//! rate(w) = weekly_rate                                   for the ramp weeks
//!         = weekly_rate * decay^(w - start - ramp + 1)    afterwards
//! budget(w) = max(circulating(w - 1) * rate(w), bootstrap)  (bootstrap during ramp only)
//! ```
//!
//! Pools receive `budget(w) * relative_weight_at(pid, week_end(w))`.

use kiln_core::constants::{
    DEFAULT_BOOTSTRAP_WEEKLY_TOKENS, DEFAULT_DECAY_BPS, DEFAULT_MAX_CHECKPOINT_WEEKS, DEFAULT_RAMP_WEEKS,
    DEFAULT_WEEKLY_RATE_BPS, ONE,
};
use kiln_core::error::{KilnError, MathError};
use kiln_core::math::{bps_to_fraction, mul_div, pow_fraction};
use kiln_core::time::{week_end, week_of, week_start, Timestamp, Week};
use kiln_core::traits::{LockedSupply, PoolDirectory, PoolRegistry, RewardSchedule, SupplyLedger};
use kiln_core::{Address, CheckpointProgress, CheckpointSeries, FuturePolicy, PoolId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::weights::WeightRegistry;

/// Emission curve parameters. Rates are ONE-scaled fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionSchedule {
    pub weekly_rate: u128,
    pub decay: u128,
    pub ramp_weeks: u64,
    pub bootstrap_weekly_rewards: u128,
}

impl EmissionSchedule {
    pub fn from_bps(weekly_rate_bps: u64, decay_bps: u64, ramp_weeks: u64, bootstrap_weekly_tokens: u64) -> Self {
        Self {
            weekly_rate: bps_to_fraction(weekly_rate_bps),
            decay: bps_to_fraction(decay_bps),
            ramp_weeks,
            bootstrap_weekly_rewards: bootstrap_weekly_tokens as u128 * ONE,
        }
    }

    /// ONE-scaled share of circulating supply emitted in week `offset` after start.
    pub fn rate(&self, offset: u64) -> Result<u128, MathError> {
        if offset < self.ramp_weeks {
            return Ok(self.weekly_rate);
        }
        let factor = pow_fraction(self.decay, offset - self.ramp_weeks + 1)?;
        mul_div(self.weekly_rate, factor, ONE)
    }

    pub fn budget(&self, offset: u64, circulating: u128) -> Result<u128, MathError> {
        let budget = mul_div(circulating, self.rate(offset)?, ONE)?;
        if offset < self.ramp_weeks {
            return Ok(budget.max(self.bootstrap_weekly_rewards));
        }
        Ok(budget)
    }
}

impl Default for EmissionSchedule {
    fn default() -> Self {
        Self::from_bps(
            DEFAULT_WEEKLY_RATE_BPS,
            DEFAULT_DECAY_BPS,
            DEFAULT_RAMP_WEEKS,
            DEFAULT_BOOTSTRAP_WEEKLY_TOKENS,
        )
    }
}

#[derive(Debug, Clone)]
pub struct RewardController<P = PoolDirectory> {
    schedule: EmissionSchedule,
    start_week: Week,
    /// First week not yet finalized.
    next_week: Week,
    budgets: CheckpointSeries<u128>,
    weights: WeightRegistry<P>,
    max_checkpoint_weeks: u64,
}

impl<P: PoolRegistry> RewardController<P> {
    /// Deploy at `deployed_at`; the deployment week is the first budgeted week.
    pub fn new(schedule: EmissionSchedule, weights: WeightRegistry<P>, deployed_at: Timestamp, max_checkpoint_weeks: u64) -> Self {
        let start_week = week_of(deployed_at);
        Self {
            schedule,
            start_week,
            next_week: start_week,
            budgets: CheckpointSeries::new(start_week, FuturePolicy::Zero, max_checkpoint_weeks),
            weights,
            max_checkpoint_weeks: max_checkpoint_weeks.max(1),
        }
    }

    /// Controller with the default curve and an empty pool directory.
    pub fn with_governance(governance: Address, deployed_at: Timestamp) -> Self
    where
        P: Default,
    {
        Self::new(
            EmissionSchedule::default(),
            WeightRegistry::new(governance, P::default()),
            deployed_at,
            DEFAULT_MAX_CHECKPOINT_WEEKS,
        )
    }

    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    pub fn weights(&self) -> &WeightRegistry<P> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut WeightRegistry<P> {
        &mut self.weights
    }

    pub fn start_week(&self) -> Week {
        self.start_week
    }

    /// First week whose budget is not yet frozen.
    ///
    /// Right after deployment this is `start_week()` itself, not the week
    /// after it; once weeks are finalized it is one past
    /// [`last_finalized_week`](Self::last_finalized_week).
    pub fn last_checkpoint(&self) -> Week {
        self.next_week
    }

    pub fn last_finalized_week(&self) -> Option<Week> {
        (self.next_week > self.start_week).then(|| self.next_week - 1)
    }

    /// Completed weeks still waiting to be finalized.
    pub fn weeks_behind(&self, now: Timestamp) -> u64 {
        week_of(now).saturating_sub(self.next_week)
    }

    /// Finalize every completed week, oldest first, at most
    /// `max_checkpoint_weeks` per call.
    ///
    /// All budgets of the call are computed before any is frozen.
    pub fn checkpoint(
        &mut self,
        now: Timestamp,
        supply: &impl SupplyLedger,
        locked: &impl LockedSupply,
    ) -> Result<CheckpointProgress, KilnError> {
        let current = week_of(now);
        if current <= self.next_week {
            return Ok(CheckpointProgress::default());
        }
        let from = self.next_week;
        let end = current.min(from + self.max_checkpoint_weeks);

        let mut budgets = Vec::with_capacity((end - from) as usize);
        for week in from..end {
            let prev = week.saturating_sub(1);
            let total = supply.total_supply_during(prev, now);
            let locked_assets = locked.total_assets_during(prev, now);
            let circulating = total.saturating_sub(locked_assets);
            let budget = self.schedule.budget(week - self.start_week, circulating)?;
            budgets.push((week, circulating, budget));
        }

        for (week, circulating, budget) in budgets {
            self.budgets.record(budget, week_start(week))?;
            self.next_week = week + 1;
            debug!(week, circulating, budget, "controller: week finalized");
        }

        Ok(CheckpointProgress {
            advanced: end - from,
            behind: current - end,
        })
    }

    /// Frozen budget of `week`; zero until finalized.
    pub fn weekly_rewards(&self, week: Week) -> u128 {
        if week < self.start_week || week >= self.next_week {
            return 0;
        }
        self.budgets.value_during(week, week_start(week))
    }

    pub fn pool_weekly_rewards(&self, pid: PoolId, week: Week) -> Result<u128, MathError> {
        let budget = self.weekly_rewards(week);
        if budget == 0 {
            return Ok(0);
        }
        let share = self.weights.relative_weight_at(pid, week_end(week))?;
        mul_div(budget, share, ONE)
    }
}

impl<P: PoolRegistry> RewardSchedule for RewardController<P> {
    fn last_finalized_week(&self) -> Option<Week> {
        RewardController::last_finalized_week(self)
    }

    fn pool_weekly_rewards(&self, pid: PoolId, week: Week) -> Result<u128, MathError> {
        RewardController::pool_weekly_rewards(self, pid, week)
    }
}
