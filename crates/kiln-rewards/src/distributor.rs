//! Per-pool reward distribution by time-weighted balance.
//!
//! Every second a balance is held earns `balance` points in the week that
//! second falls in, for the account and for the pool as a whole. Once the
//! controller finalizes a week, an account's reward for it is
//!
//! ```text
//! pool_budget(w) * user_points(w) / points(w)
//! ```
//!
//! Accrual is lazy: stored points cover time up to each holder's
//! `last_checkpoint`; views add the pending span up to `now`.

use std::collections::{BTreeMap, HashMap};

use kiln_core::error::{DistributorError, KilnError, MathError};
use kiln_core::math::{checked_add, checked_sub, mul_div};
use kiln_core::time::{seconds_within, week_of, week_start, Timestamp, Week};
use kiln_core::traits::{RewardMinter, RewardSchedule};
use kiln_core::{Address, CheckpointProgress, PoolId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Emitted when a claim pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRewards {
    pub pid: PoolId,
    pub account: Address,
    pub amount: u128,
    /// First and last week paid by this claim.
    pub from_week: Week,
    pub to_week: Week,
}

/// Balance and stored weekly points of the pool or of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Holder {
    balance: u128,
    last_checkpoint: Timestamp,
    points: BTreeMap<Week, u128>,
}

/// Accrual computed but not yet applied.
#[derive(Debug, Default)]
struct Accrual {
    points: Vec<(Week, u128)>,
    reached: Timestamp,
    progress: CheckpointProgress,
}

impl Holder {
    fn starting_at(now: Timestamp) -> Self {
        Self {
            last_checkpoint: now,
            ..Self::default()
        }
    }

    /// Plan accrual from `last_checkpoint` up to `now`, at most `max_weeks`
    /// week boundaries at a time.
    fn plan(&self, now: Timestamp, max_weeks: u64) -> Result<Accrual, MathError> {
        let from = self.last_checkpoint;
        if now <= from {
            return Ok(Accrual {
                reached: from,
                ..Accrual::default()
            });
        }
        let (first, last) = (week_of(from), week_of(now));
        let end = last.min(first + max_weeks);
        let reached = if end == last { now } else { week_start(end) };
        let progress = CheckpointProgress {
            advanced: end - first,
            behind: last - end,
        };
        if self.balance == 0 {
            return Ok(Accrual {
                points: Vec::new(),
                reached,
                progress,
            });
        }

        let mut points = Vec::new();
        for week in first..=end {
            let seconds = seconds_within(week, from, reached);
            if seconds == 0 {
                continue;
            }
            let earned = self
                .balance
                .checked_mul(seconds as u128)
                .ok_or(MathError::Overflow)?;
            let stored = self.points.get(&week).copied().unwrap_or_default();
            points.push((week, checked_add(stored, earned)?));
        }
        Ok(Accrual {
            points,
            reached,
            progress,
        })
    }

    fn apply(&mut self, accrual: Accrual) {
        self.points.extend(accrual.points);
        self.last_checkpoint = self.last_checkpoint.max(accrual.reached);
    }

    /// Points during `week`, including the unaccrued span up to `now`.
    fn points_during(&self, week: Week, now: Timestamp) -> u128 {
        let stored = self.points.get(&week).copied().unwrap_or_default();
        let pending = seconds_within(week, self.last_checkpoint, now) as u128;
        stored.saturating_add(self.balance.saturating_mul(pending))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Account {
    holder: Holder,
    next_claim_week: Week,
}

/// Reward distributor for one pool.
#[derive(Debug, Clone)]
pub struct PoolDistributor {
    pid: PoolId,
    /// Minter identity used when paying rewards.
    address: Address,
    pool: Holder,
    accounts: HashMap<Address, Account>,
    max_checkpoint_weeks: u64,
}

impl PoolDistributor {
    pub fn new(pid: PoolId, address: Address, deployed_at: Timestamp, max_checkpoint_weeks: u64) -> Self {
        Self {
            pid,
            address,
            pool: Holder::starting_at(deployed_at),
            accounts: HashMap::new(),
            max_checkpoint_weeks: max_checkpoint_weeks.max(1),
        }
    }

    pub fn pid(&self) -> PoolId {
        self.pid
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.accounts.get(account).map_or(0, |a| a.holder.balance)
    }

    pub fn total_balance(&self) -> u128 {
        self.pool.balance
    }

    pub fn last_checkpoint(&self) -> Timestamp {
        self.pool.last_checkpoint
    }

    pub fn user_last_checkpoint(&self, account: &Address) -> Option<Timestamp> {
        self.accounts.get(account).map(|a| a.holder.last_checkpoint)
    }

    pub fn next_claim_week(&self, account: &Address) -> Option<Week> {
        self.accounts.get(account).map(|a| a.next_claim_week)
    }

    pub fn user_points(&self, account: &Address, week: Week, now: Timestamp) -> u128 {
        self.accounts
            .get(account)
            .map_or(0, |a| a.holder.points_during(week, now))
    }

    pub fn points(&self, week: Week, now: Timestamp) -> u128 {
        self.pool.points_during(week, now)
    }

    pub fn deposit(&mut self, account: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        if amount == 0 {
            return Err(DistributorError::ZeroAmount.into());
        }
        let now = self.effective(now);
        let (pool_accrual, user_accrual) = self.plan_both(account, now)?;
        let balance = checked_add(self.balance_of(account), amount)?;
        let total = checked_add(self.pool.balance, amount)?;

        self.commit(account, pool_accrual, user_accrual, now);
        self.pool.balance = total;
        if let Some(entry) = self.accounts.get_mut(account) {
            entry.holder.balance = balance;
        }

        debug!(pid = %self.pid, %account, amount, balance, total, "distributor: deposit");
        Ok(())
    }

    pub fn withdraw(&mut self, account: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        if amount == 0 {
            return Err(DistributorError::ZeroAmount.into());
        }
        let have = self.balance_of(account);
        if amount > have {
            return Err(DistributorError::InsufficientBalance { have, need: amount }.into());
        }
        let now = self.effective(now);
        let (pool_accrual, user_accrual) = self.plan_both(account, now)?;
        let total = checked_sub(self.pool.balance, amount)?;

        self.commit(account, pool_accrual, user_accrual, now);
        self.pool.balance = total;
        if let Some(entry) = self.accounts.get_mut(account) {
            entry.holder.balance = have - amount;
        }

        debug!(pid = %self.pid, %account, amount, total, "distributor: withdraw");
        Ok(())
    }

    /// Accrue the pool's points up to `now`, bounded per call.
    pub fn checkpoint(&mut self, now: Timestamp) -> Result<CheckpointProgress, MathError> {
        let accrual = self.pool.plan(now, self.max_checkpoint_weeks)?;
        let progress = accrual.progress;
        self.pool.apply(accrual);
        Ok(progress)
    }

    /// Accrue one account's points up to `now`, bounded per call.
    pub fn user_checkpoint(&mut self, account: &Address, now: Timestamp) -> Result<CheckpointProgress, MathError> {
        let max_weeks = self.max_checkpoint_weeks;
        let Some(entry) = self.accounts.get_mut(account) else {
            return Ok(CheckpointProgress::default());
        };
        let accrual = entry.holder.plan(now, max_weeks)?;
        let progress = accrual.progress;
        entry.holder.apply(accrual);
        Ok(progress)
    }

    /// Pay `account` its share of every finalized week not yet claimed.
    ///
    /// Returns `None` when there is nothing to pay; the claim marker still
    /// advances past the weeks examined.
    pub fn claim_rewards(
        &mut self,
        account: &Address,
        now: Timestamp,
        schedule: &impl RewardSchedule,
        minter: &mut impl RewardMinter,
    ) -> Result<Option<ClaimRewards>, KilnError> {
        let Some(from) = self.next_claim_week(account) else {
            return Ok(None);
        };
        let now = self.effective(now);
        let (pool_accrual, user_accrual) = self.plan_both(account, now)?;

        // Only weeks that are both finalized and fully accrued.
        let current = week_of(now);
        let last = match schedule.last_finalized_week() {
            Some(last) if last >= from && current > from => last.min(current - 1),
            _ => {
                self.commit(account, pool_accrual, user_accrual, now);
                return Ok(None);
            }
        };
        let to = last.min(from + self.max_checkpoint_weeks - 1);

        let mut amount = 0u128;
        for week in from..=to {
            let total = accrued_points(&self.pool, &pool_accrual, week);
            if total == 0 {
                continue;
            }
            let user = self
                .accounts
                .get(account)
                .map_or(0, |a| accrued_points(&a.holder, &user_accrual, week));
            let budget = schedule.pool_weekly_rewards(self.pid, week)?;
            amount = checked_add(amount, mul_div(budget, user, total)?)?;
        }

        if amount > 0 {
            minter.mint(&self.address, account, amount, now)?;
        }
        self.commit(account, pool_accrual, user_accrual, now);
        if let Some(entry) = self.accounts.get_mut(account) {
            entry.next_claim_week = to + 1;
        }

        if amount == 0 {
            return Ok(None);
        }
        info!(pid = %self.pid, %account, amount, from_week = from, to_week = to, "distributor: rewards claimed");
        Ok(Some(ClaimRewards {
            pid: self.pid,
            account: *account,
            amount,
            from_week: from,
            to_week: to,
        }))
    }

    /// Balance changes never take effect before the pool's accrual cursor,
    /// so pool points always equal the sum of account points.
    fn effective(&self, now: Timestamp) -> Timestamp {
        now.max(self.pool.last_checkpoint)
    }

    /// Plan pool and account accrual to `now`; both must fit in one call.
    fn plan_both(&self, account: &Address, now: Timestamp) -> Result<(Accrual, Accrual), KilnError> {
        let pool = self.pool.plan(now, self.max_checkpoint_weeks)?;
        let user = match self.accounts.get(account) {
            Some(entry) => entry.holder.plan(now, self.max_checkpoint_weeks)?,
            None => Accrual {
                reached: now,
                ..Accrual::default()
            },
        };
        let behind = pool.progress.behind.max(user.progress.behind);
        if behind > 0 {
            return Err(DistributorError::AccrualBehind { behind }.into());
        }
        Ok((pool, user))
    }

    fn commit(&mut self, account: &Address, pool: Accrual, user: Accrual, now: Timestamp) {
        self.pool.apply(pool);
        let entry = self.accounts.entry(*account).or_insert_with(|| Account {
            holder: Holder::starting_at(now),
            next_claim_week: week_of(now),
        });
        entry.holder.apply(user);
    }
}

/// Stored points for `week` after a planned accrual.
fn accrued_points(holder: &Holder, accrual: &Accrual, week: Week) -> u128 {
    accrual
        .points
        .iter()
        .find(|(w, _)| *w == week)
        .map(|(_, p)| *p)
        .unwrap_or_else(|| holder.points.get(&week).copied().unwrap_or_default())
}
