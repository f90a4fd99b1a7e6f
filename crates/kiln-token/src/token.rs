//! Emission token with weekly supply checkpoints.
//!
//! Supply history starts at `start_week = week_of(deployment) + 1`; anything
//! minted before that lands in the `start_week` bucket. Two series are kept
//! in lockstep (same start, same cursor, written and checkpointed together):
//!
//! - realized supply: the supply at the end of each week
//! - maximum supply: the highest supply reached during each week. Burns lower
//!   the realized series only, and quiet weeks inherit the previous week's
//!   high-water mark, so this is an upper bound on what the week could have
//!   held.

use std::collections::HashMap;

use kiln_core::error::{KilnError, TokenError};
use kiln_core::math::{checked_add, checked_sub};
use kiln_core::time::{week_of, Timestamp, Week};
use kiln_core::traits::{AssetLedger, MinterRegistry, RewardMinter, SupplyLedger};
use kiln_core::{Address, CheckpointProgress, CheckpointSeries, FuturePolicy};
use tracing::debug;

use crate::minters::MinterSet;

#[derive(Debug, Clone)]
pub struct EmissionToken<R = MinterSet> {
    minters: R,
    balances: HashMap<Address, u128>,
    total_supply: u128,
    supply: CheckpointSeries<u128>,
    maximum_supply: CheckpointSeries<u128>,
}

impl<R: MinterRegistry> EmissionToken<R> {
    /// Deploy at `deployed_at`. Supply history begins the following week.
    pub fn new(minters: R, deployed_at: Timestamp, max_checkpoint_weeks: u64) -> Self {
        let start_week = week_of(deployed_at) + 1;
        Self {
            minters,
            balances: HashMap::new(),
            total_supply: 0,
            supply: CheckpointSeries::new(start_week, FuturePolicy::Zero, max_checkpoint_weeks),
            maximum_supply: CheckpointSeries::new(start_week, FuturePolicy::Zero, max_checkpoint_weeks),
        }
    }

    pub fn minters(&self) -> &R {
        &self.minters
    }

    pub fn minters_mut(&mut self) -> &mut R {
        &mut self.minters
    }

    pub fn start_week(&self) -> Week {
        self.supply.start_week()
    }

    pub fn last_checkpoint(&self) -> Week {
        self.supply.last_checkpoint()
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Realized supply during `week` as seen at `now`.
    pub fn total_supply_during(&self, week: Week, now: Timestamp) -> u128 {
        self.supply.value_during(week, now)
    }

    /// Highest supply reached during `week` as seen at `now`.
    pub fn maximum_total_supply_during(&self, week: Week, now: Timestamp) -> u128 {
        self.maximum_supply.value_during(week, now)
    }

    /// Weeks the supply history lags behind `now`.
    pub fn weeks_behind(&self, now: Timestamp) -> u64 {
        self.supply.weeks_behind(now)
    }

    /// Mint `amount` to `to`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Unauthorized`] if `caller` is not a registered minter
    /// - [`SeriesError::CheckpointBehind`](kiln_core::error::SeriesError) if
    ///   the supply history needs checkpointing first
    pub fn mint(&mut self, caller: &Address, to: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        if !self.minters.is_minter(caller) {
            return Err(TokenError::Unauthorized(*caller).into());
        }
        let balance = checked_add(self.balance_of(to), amount)?;
        let total = checked_add(self.total_supply, amount)?;
        let peak = self.maximum_supply.current().max(total);

        self.write_supply(total, peak, now)?;
        self.balances.insert(*to, balance);
        self.total_supply = total;
        debug!(%to, amount, total, "token: minted");
        Ok(())
    }

    /// Burn `amount` from the caller's own balance.
    pub fn burn(&mut self, caller: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        let have = self.balance_of(caller);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount }.into());
        }
        let total = checked_sub(self.total_supply, amount)?;
        let peak = self.maximum_supply.current();

        self.write_supply(total, peak, now)?;
        self.balances.insert(*caller, have - amount);
        self.total_supply = total;
        debug!(from = %caller, amount, total, "token: burned");
        Ok(())
    }

    /// Move `amount` between balances. Supply is unaffected.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        if from == to {
            return Ok(());
        }
        let credited = self.balance_of(to).saturating_add(amount);
        self.balances.insert(*from, have - amount);
        self.balances.insert(*to, credited);
        Ok(())
    }

    /// Materialize missed supply weeks up to `now` (bounded per call).
    pub fn checkpoint(&mut self, now: Timestamp) -> CheckpointProgress {
        let realized = self.supply.checkpoint(now);
        let maximum = self.maximum_supply.checkpoint(now);
        realized.merge(maximum)
    }

    fn write_supply(&mut self, total: u128, peak: u128, now: Timestamp) -> Result<(), KilnError> {
        // Both series share start week and cursor, so if the first write is
        // accepted the second one is too.
        self.supply.record(total, now)?;
        self.maximum_supply.record(peak, now)?;
        Ok(())
    }
}

impl<R: MinterRegistry> AssetLedger for EmissionToken<R> {
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), KilnError> {
        EmissionToken::transfer(self, from, to, amount).map_err(Into::into)
    }
}

impl<R: MinterRegistry> RewardMinter for EmissionToken<R> {
    fn mint(&mut self, caller: &Address, to: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        EmissionToken::mint(self, caller, to, amount, now)
    }
}

impl<R: MinterRegistry> SupplyLedger for EmissionToken<R> {
    fn total_supply_during(&self, week: Week, now: Timestamp) -> u128 {
        EmissionToken::total_supply_during(self, week, now)
    }
}
