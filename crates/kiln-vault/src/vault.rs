//! Duration-weighted lock vault.
//!
//! A deposit of `amount` locked for `weeks` mints
//! `amount * weeks / MAX_LOCK_WEEKS` shares, scaled by `total_supply /
//! total_assets` once the vault holds anything. On maturity the lock pays back
//! its principal plus its shares' slice of the accrued yield:
//!
//! ```text
//! yield_portion = shares * (total_assets - total_principal) / total_supply
//! ```
//!
//! Invariants kept by every write:
//! - `total_supply == Σ shares` of live locks
//! - `total_principal == Σ amount` of live locks
//!
//! `total_assets` is whatever the yield source reports. If it ever drops below
//! `total_principal`, matured principal is paid out pro-rata instead.

use std::collections::HashMap;

use kiln_core::constants::{MAX_LOCK_WEEKS, WEEK};
use kiln_core::error::{KilnError, MathError, VaultError};
use kiln_core::math::{checked_add, checked_sub, mul_div};
use kiln_core::time::{week_of, week_start, Timestamp, Week};
use kiln_core::traits::{AssetLedger, LockedSupply, YieldSource};
use kiln_core::{Address, CheckpointProgress, CheckpointSeries, FuturePolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::lock::{Lock, LockQueue};
use crate::yield_source::{DirectFarm, FarmBar};

/// What settling a set of matured locks pays out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawPreview {
    /// Vault shares burned.
    pub shares: u128,
    /// Principal originally locked.
    pub principal: u128,
    /// Total paid out: principal plus yield (or a pro-rata haircut on principal).
    pub assets: u128,
    /// Part of `assets` that is accrued yield.
    pub yield_portion: u128,
}

#[derive(Debug, Clone)]
pub struct LockVault<Y = DirectFarm> {
    address: Address,
    source: Y,
    start_week: Week,
    total_supply: u128,
    total_principal: u128,
    queues: HashMap<Address, LockQueue>,
    total_assets: CheckpointSeries<u128>,
    user_assets: HashMap<Address, CheckpointSeries<u128>>,
    max_checkpoint_weeks: u64,
}

impl<Y: YieldSource> LockVault<Y> {
    /// Deploy at `deployed_at`, holding balances on the asset ledger under
    /// `address`. Deposits open at the start of the following week.
    pub fn new(address: Address, source: Y, deployed_at: Timestamp, max_checkpoint_weeks: u64) -> Self {
        let start_week = week_of(deployed_at) + 1;
        Self {
            address,
            source,
            start_week,
            total_supply: 0,
            total_principal: 0,
            queues: HashMap::new(),
            total_assets: CheckpointSeries::new(start_week, FuturePolicy::Zero, max_checkpoint_weeks),
            user_assets: HashMap::new(),
            max_checkpoint_weeks,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn source(&self) -> &Y {
        &self.source
    }

    #[cfg(test)]
    fn source_mut(&mut self) -> &mut Y {
        &mut self.source
    }

    pub fn start_week(&self) -> Week {
        self.start_week
    }

    pub fn opens_at(&self) -> Timestamp {
        week_start(self.start_week)
    }

    pub fn last_checkpoint(&self) -> Week {
        self.total_assets.last_checkpoint()
    }

    pub fn weeks_behind(&self, now: Timestamp) -> u64 {
        self.total_assets.weeks_behind(now)
    }

    pub fn total_assets(&self) -> u128 {
        self.source.total_balance()
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn total_principal(&self) -> u128 {
        self.total_principal
    }

    pub fn total_assets_during(&self, week: Week, now: Timestamp) -> u128 {
        self.total_assets.value_during(week, now)
    }

    /// Principal `account` had locked during `week`.
    pub fn user_assets_during(&self, account: &Address, week: Week, now: Timestamp) -> u128 {
        self.user_assets
            .get(account)
            .map_or(0, |series| series.value_during(week, now))
    }

    /// Live locks of `account` with their ids, oldest first.
    pub fn locks_of(&self, account: &Address) -> Vec<(usize, Lock)> {
        self.queues
            .get(account)
            .map(|q| q.live().map(|(i, lock)| (i, *lock)).collect())
            .unwrap_or_default()
    }

    pub fn shares_of(&self, account: &Address) -> u128 {
        self.queues.get(account).map_or(0, LockQueue::live_shares)
    }

    /// Shares a deposit of `amount` locked for `weeks` would mint. Rounds down.
    pub fn preview_deposit(&self, amount: u128, weeks: u64) -> Result<u128, MathError> {
        let weeks = weeks.min(MAX_LOCK_WEEKS);
        let weighted = mul_div(amount, weeks as u128, MAX_LOCK_WEEKS as u128)?;
        let assets = self.total_assets();
        if self.total_supply == 0 || assets == 0 {
            return Ok(weighted);
        }
        mul_div(weighted, self.total_supply, assets)
    }

    /// Lock `amount` from `caller` for `weeks`, credited to `beneficiary`.
    ///
    /// Returns the new lock's id in the beneficiary's queue.
    pub fn deposit(
        &mut self,
        ledger: &mut impl AssetLedger,
        caller: &Address,
        amount: u128,
        weeks: u64,
        beneficiary: &Address,
        now: Timestamp,
    ) -> Result<usize, KilnError> {
        let opens_at = self.opens_at();
        if now < opens_at {
            return Err(VaultError::NotStarted { opens_at }.into());
        }
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        if weeks == 0 || weeks > MAX_LOCK_WEEKS {
            return Err(VaultError::InvalidLockDuration(weeks).into());
        }

        let shares = self.preview_deposit(amount, weeks)?;
        let total_supply = checked_add(self.total_supply, shares)?;
        let total_principal = checked_add(self.total_principal, amount)?;
        checked_add(self.total_assets(), amount)?;
        let user_principal = checked_add(self.principal_of(beneficiary), amount)?;
        self.total_assets.check_write(now)?;
        if let Some(series) = self.user_assets.get(beneficiary) {
            series.check_write(now)?;
        }

        ledger.transfer(caller, &self.address, amount)?;
        self.source.deposit(amount)?;

        let lock = Lock {
            amount,
            weeks,
            deposited_week: week_of(now),
            maturity: now.saturating_add(weeks * WEEK),
            shares,
            settled: false,
        };
        let index = self.queues.entry(*beneficiary).or_default().push(lock);
        self.total_supply = total_supply;
        self.total_principal = total_principal;
        self.total_assets.record(self.source.total_balance(), now)?;
        self.user_series(beneficiary, now).record(user_principal, now)?;

        debug!(
            %beneficiary,
            amount,
            weeks,
            shares,
            maturity = lock.maturity,
            "vault: deposit"
        );
        Ok(index)
    }

    /// What withdrawing every matured lock of `account` would pay at `now`.
    pub fn preview_withdraw(&self, account: &Address, now: Timestamp) -> Result<WithdrawPreview, MathError> {
        let Some(queue) = self.queues.get(account) else {
            return Ok(WithdrawPreview::default());
        };
        self.preview_locks(queue.matured(now).map(|(_, lock)| lock))
    }

    /// Settle every matured lock of `account` and pay it out.
    pub fn withdraw(
        &mut self,
        ledger: &mut impl AssetLedger,
        account: &Address,
        now: Timestamp,
    ) -> Result<WithdrawPreview, KilnError> {
        let queue = match self.queues.get(account) {
            Some(queue) if queue.has_live() => queue,
            _ => return Err(VaultError::NoLocks.into()),
        };
        let ids: Vec<usize> = queue.matured(now).map(|(i, _)| i).collect();
        if ids.is_empty() {
            let next_maturity = queue.next_maturity().unwrap_or_default();
            return Err(VaultError::WithdrawalDenied { next_maturity }.into());
        }
        self.settle(ledger, account, &ids, now)
    }

    /// Settle a single matured lock of `account`.
    pub fn withdraw_lock(
        &mut self,
        ledger: &mut impl AssetLedger,
        account: &Address,
        index: usize,
        now: Timestamp,
    ) -> Result<WithdrawPreview, KilnError> {
        let lock = self
            .queues
            .get(account)
            .and_then(|q| q.get(index))
            .filter(|lock| !lock.settled)
            .ok_or(VaultError::UnknownLock(index))?;
        if !lock.is_matured(now) {
            return Err(VaultError::TooEarly { maturity: lock.maturity }.into());
        }
        self.settle(ledger, account, &[index], now)
    }

    /// External yield arriving in the vault. Raises assets, not supply.
    pub fn inject_yield(
        &mut self,
        ledger: &mut impl AssetLedger,
        from: &Address,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), KilnError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        checked_add(self.total_assets(), amount)?;
        self.total_assets.check_write(now)?;

        ledger.transfer(from, &self.address, amount)?;
        self.source.deposit(amount)?;
        self.total_assets.record(self.source.total_balance(), now)?;

        info!(%from, amount, total_assets = self.total_assets(), "vault: yield injected");
        Ok(())
    }

    pub fn checkpoint(&mut self, now: Timestamp) -> CheckpointProgress {
        self.total_assets.checkpoint(now)
    }

    pub fn user_checkpoint(&mut self, account: &Address, now: Timestamp) -> CheckpointProgress {
        self.user_assets
            .get_mut(account)
            .map(|series| series.checkpoint(now))
            .unwrap_or_default()
    }

    fn principal_of(&self, account: &Address) -> u128 {
        self.queues.get(account).map_or(0, LockQueue::live_principal)
    }

    /// A user's series starts at their first deposit week, so a late first
    /// deposit never has years of history to fill.
    fn user_series(&mut self, account: &Address, now: Timestamp) -> &mut CheckpointSeries<u128> {
        let start = week_of(now).max(self.start_week);
        let max_weeks = self.max_checkpoint_weeks;
        self.user_assets
            .entry(*account)
            .or_insert_with(|| CheckpointSeries::new(start, FuturePolicy::Zero, max_weeks))
    }

    fn preview_locks<'a>(&self, locks: impl Iterator<Item = &'a Lock>) -> Result<WithdrawPreview, MathError> {
        let (mut shares, mut principal) = (0u128, 0u128);
        for lock in locks {
            shares = checked_add(shares, lock.shares)?;
            principal = checked_add(principal, lock.amount)?;
        }
        if principal == 0 {
            return Ok(WithdrawPreview::default());
        }

        let assets = self.total_assets();
        if assets < self.total_principal {
            let paid = mul_div(principal, assets, self.total_principal)?;
            return Ok(WithdrawPreview {
                shares,
                principal,
                assets: paid,
                yield_portion: 0,
            });
        }
        let yield_portion = if self.total_supply == 0 {
            0
        } else {
            mul_div(shares, assets - self.total_principal, self.total_supply)?
        };
        Ok(WithdrawPreview {
            shares,
            principal,
            assets: checked_add(principal, yield_portion)?,
            yield_portion,
        })
    }

    fn settle(
        &mut self,
        ledger: &mut impl AssetLedger,
        account: &Address,
        ids: &[usize],
        now: Timestamp,
    ) -> Result<WithdrawPreview, KilnError> {
        let queue = self.queues.get(account).ok_or(VaultError::NoLocks)?;
        let preview = self.preview_locks(ids.iter().filter_map(|&i| queue.get(i)))?;

        let total_supply = checked_sub(self.total_supply, preview.shares)?;
        let total_principal = checked_sub(self.total_principal, preview.principal)?;
        let user_principal = checked_sub(queue.live_principal(), preview.principal)?;
        let have = self.total_assets();
        if have < preview.assets {
            return Err(VaultError::InsufficientAssets {
                have,
                need: preview.assets,
            }
            .into());
        }
        self.total_assets.check_write(now)?;
        if let Some(series) = self.user_assets.get(account) {
            series.check_write(now)?;
        }

        ledger.transfer(&self.address, account, preview.assets)?;
        self.source.withdraw(preview.assets)?;

        if let Some(queue) = self.queues.get_mut(account) {
            for &i in ids {
                queue.settle(i);
            }
        }
        self.total_supply = total_supply;
        self.total_principal = total_principal;
        self.total_assets.record(self.source.total_balance(), now)?;
        self.user_series(account, now).record(user_principal, now)?;

        info!(
            %account,
            locks = ids.len(),
            shares = preview.shares,
            assets = preview.assets,
            yield_portion = preview.yield_portion,
            "vault: withdraw"
        );
        Ok(preview)
    }
}

impl LockVault<FarmBar> {
    /// Fold `amount` of harvested farm rewards, held by `harvester`, into the
    /// bar. The tokens move to the vault's address on the ledger, so the
    /// raised bar value is backed by transferable assets.
    pub fn compound(
        &mut self,
        ledger: &mut impl AssetLedger,
        harvester: &Address,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), KilnError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        checked_add(self.total_assets(), amount)?;
        self.total_assets.check_write(now)?;

        ledger.transfer(harvester, &self.address, amount)?;
        self.source.compound(amount)?;
        self.total_assets.record(self.source.total_balance(), now)?;

        info!(%harvester, amount, total_assets = self.total_assets(), "vault: farm rewards compounded");
        Ok(())
    }
}

impl<Y: YieldSource> LockedSupply for LockVault<Y> {
    fn total_assets_during(&self, week: Week, now: Timestamp) -> u128 {
        LockVault::total_assets_during(self, week, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::constants::{DAY, ONE};
    use kiln_core::error::{SeriesError, TokenError};
    use kiln_token::{EmissionToken, MinterSet};
    use proptest::prelude::*;

    // 2023-01-01T00:00:00Z
    const DEPLOY: Timestamp = 1_672_531_200;

    fn gov() -> Address {
        Address::from_seed(0xaa)
    }

    fn vault_addr() -> Address {
        Address::from_seed(0xee)
    }

    fn alice() -> Address {
        Address::from_seed(1)
    }

    fn bob() -> Address {
        Address::from_seed(2)
    }

    fn carol() -> Address {
        Address::from_seed(3)
    }

    fn token() -> EmissionToken {
        let mut minters = MinterSet::new(gov());
        minters.set_minter(&gov(), gov(), true).unwrap();
        EmissionToken::new(minters, DEPLOY, 520)
    }

    fn funded(accounts: &[(Address, u128)]) -> EmissionToken {
        let mut t = token();
        for (account, amount) in accounts {
            t.mint(&gov(), account, *amount, DEPLOY).unwrap();
        }
        t
    }

    fn vault() -> LockVault {
        LockVault::new(vault_addr(), DirectFarm::new(), DEPLOY, 520)
    }

    /// Source that can lose assets, to exercise the principal haircut.
    #[derive(Default)]
    struct LossySource {
        balance: u128,
    }

    impl YieldSource for LossySource {
        fn deposit(&mut self, amount: u128) -> Result<(), MathError> {
            self.balance = checked_add(self.balance, amount)?;
            Ok(())
        }

        fn withdraw(&mut self, amount: u128) -> Result<(), KilnError> {
            self.balance = checked_sub(self.balance, amount)?;
            Ok(())
        }

        fn total_balance(&self) -> u128 {
            self.balance
        }
    }

    // ------------------------------------------------------------------
    // Share pricing
    // ------------------------------------------------------------------

    #[test]
    fn one_week_lock_is_weighted_by_duration() {
        let v = vault();
        assert_eq!(v.preview_deposit(MAX_LOCK_WEEKS as u128 * ONE, 1).unwrap(), ONE);
        assert_eq!(v.preview_deposit(ONE, MAX_LOCK_WEEKS).unwrap(), ONE);
        // Durations past the maximum price as the maximum.
        assert_eq!(v.preview_deposit(ONE, 500).unwrap(), ONE);
        assert_eq!(v.preview_deposit(1, 1).unwrap(), 0);
    }

    #[test]
    fn supply_equals_issued_shares() {
        let mut t = funded(&[(alice(), 104 * ONE), (bob(), 52 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();

        v.deposit(&mut t, &alice(), 104 * ONE, 1, &alice(), now).unwrap();
        let expected = v.preview_deposit(52 * ONE, 104).unwrap();
        v.deposit(&mut t, &bob(), 52 * ONE, 104, &bob(), now).unwrap();

        assert_eq!(v.shares_of(&alice()), ONE);
        assert_eq!(v.shares_of(&bob()), expected);
        assert_eq!(expected, ONE / 2);
        assert_eq!(v.total_supply(), ONE + ONE / 2);
        assert_eq!(v.total_principal(), 156 * ONE);
        assert_eq!(v.total_assets(), 156 * ONE);
        assert_eq!(t.balance_of(&vault_addr()), 156 * ONE);
    }

    #[test]
    fn matured_lock_previews_principal_before_yield() {
        let mut t = funded(&[(alice(), 104 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 104 * ONE, 1, &alice(), now).unwrap();

        assert_eq!(v.preview_withdraw(&alice(), now).unwrap(), WithdrawPreview::default());

        let matured = now + WEEK;
        let preview = v.preview_withdraw(&alice(), matured).unwrap();
        assert_eq!(preview.shares, ONE);
        assert_eq!(preview.assets, 104 * ONE);
        assert_eq!(preview.yield_portion, 0);
    }

    // ------------------------------------------------------------------
    // Yield
    // ------------------------------------------------------------------

    #[test]
    fn injected_yield_is_paid_pro_rata_to_shares() {
        let mut t = funded(&[(alice(), 104 * ONE), (bob(), 52 * ONE), (carol(), 13 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 104 * ONE, 1, &alice(), now).unwrap();
        v.deposit(&mut t, &bob(), 52 * ONE, 104, &bob(), now).unwrap();

        v.inject_yield(&mut t, &carol(), 13 * ONE, now + DAY).unwrap();
        assert_eq!(v.total_assets(), 169 * ONE);
        assert_eq!(v.total_supply(), ONE + ONE / 2);
        assert_eq!(v.total_principal(), 156 * ONE);

        let out = v.withdraw(&mut t, &alice(), now + WEEK).unwrap();
        assert_eq!(out.principal, 104 * ONE);
        assert!(out.assets > 104 * ONE);
        assert_eq!(t.balance_of(&alice()), out.assets);

        let late = now + MAX_LOCK_WEEKS * WEEK;
        let bob_out = v.withdraw(&mut t, &bob(), late).unwrap();
        assert_eq!(bob_out.principal, 52 * ONE);
        // Alice holds twice Bob's shares.
        assert!(out.yield_portion.abs_diff(2 * bob_out.yield_portion) <= 2);
        assert_eq!(out.yield_portion + bob_out.yield_portion, 13 * ONE);

        assert_eq!(v.total_supply(), 0);
        assert_eq!(v.total_principal(), 0);
        assert_eq!(v.total_assets(), 0);
        assert_eq!(t.balance_of(&vault_addr()), 0);
    }

    #[test]
    fn yield_makes_later_shares_dearer() {
        let mut t = funded(&[(alice(), 100 * ONE), (bob(), 100 * ONE), (carol(), 100 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 100 * ONE, MAX_LOCK_WEEKS, &alice(), now).unwrap();
        v.inject_yield(&mut t, &carol(), 100 * ONE, now).unwrap();

        assert_eq!(v.preview_deposit(100 * ONE, MAX_LOCK_WEEKS).unwrap(), 50 * ONE);
    }

    #[test]
    fn assets_below_principal_pay_out_pro_rata() {
        let mut t = funded(&[(alice(), 100 * ONE), (bob(), 100 * ONE)]);
        let mut v = LockVault::new(vault_addr(), LossySource::default(), DEPLOY, 520);
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 100 * ONE, 1, &alice(), now).unwrap();
        v.deposit(&mut t, &bob(), 100 * ONE, 1, &bob(), now).unwrap();

        v.source_mut().balance = 150 * ONE;
        let preview = v.preview_withdraw(&alice(), now + WEEK).unwrap();
        assert_eq!(preview.principal, 100 * ONE);
        assert_eq!(preview.assets, 75 * ONE);
        assert_eq!(preview.yield_portion, 0);
    }

    #[test]
    fn farm_bar_backed_vault_tracks_bar_value() {
        let mut t = funded(&[(alice(), 10 * ONE), (carol(), 5 * ONE)]);
        let mut v = LockVault::new(vault_addr(), FarmBar::new(), DEPLOY, 520);
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 10 * ONE, 1, &alice(), now).unwrap();
        v.inject_yield(&mut t, &carol(), 5 * ONE, now).unwrap();
        assert_eq!(v.total_assets(), 15 * ONE);

        let out = v.withdraw(&mut t, &alice(), now + WEEK).unwrap();
        assert_eq!(out.assets, 15 * ONE);
        assert_eq!(v.source().shares(), 0);
    }

    #[test]
    fn compounded_rewards_are_withdrawable() {
        let harvester = Address::from_seed(0x77);
        let mut t = funded(&[(alice(), 10 * ONE), (harvester, 5 * ONE)]);
        let mut v = LockVault::new(vault_addr(), FarmBar::new(), DEPLOY, 520);
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 10 * ONE, 1, &alice(), now).unwrap();

        v.compound(&mut t, &harvester, 5 * ONE, now + DAY).unwrap();
        assert_eq!(v.total_assets(), 15 * ONE);
        assert_eq!(v.source().shares(), 10 * ONE);
        assert_eq!(t.balance_of(&vault_addr()), 15 * ONE);
        assert_eq!(v.total_assets_during(week_of(now), now + DAY), 15 * ONE);

        let preview = v.preview_withdraw(&alice(), now + WEEK).unwrap();
        assert_eq!(preview.assets, 15 * ONE);
        let out = v.withdraw(&mut t, &alice(), now + WEEK).unwrap();
        assert_eq!(out, preview);
        assert_eq!(t.balance_of(&alice()), 15 * ONE);
        assert_eq!(t.balance_of(&vault_addr()), 0);
        assert_eq!(v.source().shares(), 0);
    }

    #[test]
    fn compound_without_funds_leaves_vault_untouched() {
        let mut t = funded(&[(alice(), 10 * ONE)]);
        let mut v = LockVault::new(vault_addr(), FarmBar::new(), DEPLOY, 520);
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), 10 * ONE, 1, &alice(), now).unwrap();

        let err = v.compound(&mut t, &bob(), 5 * ONE, now).unwrap_err();
        assert!(matches!(err, KilnError::Token(TokenError::InsufficientBalance { .. })));
        assert_eq!(v.total_assets(), 10 * ONE);
        assert_eq!(v.compound(&mut t, &bob(), 0, now).unwrap_err(), KilnError::Vault(VaultError::ZeroAmount));
    }

    // ------------------------------------------------------------------
    // Withdrawal policy
    // ------------------------------------------------------------------

    #[test]
    fn withdraw_without_locks_fails() {
        let mut t = token();
        let mut v = vault();
        let err = v.withdraw(&mut t, &alice(), v.opens_at()).unwrap_err();
        assert_eq!(err, KilnError::Vault(VaultError::NoLocks));
    }

    #[test]
    fn withdraw_before_maturity_reports_next_maturity() {
        let mut t = funded(&[(alice(), 2 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), ONE, 4, &alice(), now).unwrap();
        v.deposit(&mut t, &alice(), ONE, 2, &alice(), now).unwrap();

        let err = v.withdraw(&mut t, &alice(), now + WEEK).unwrap_err();
        assert_eq!(
            err,
            KilnError::Vault(VaultError::WithdrawalDenied { next_maturity: now + 2 * WEEK })
        );
    }

    #[test]
    fn withdraw_settles_every_matured_lock() {
        let mut t = funded(&[(alice(), 3 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), ONE, 3, &alice(), now).unwrap();
        v.deposit(&mut t, &alice(), ONE, 1, &alice(), now).unwrap();
        v.deposit(&mut t, &alice(), ONE, 2, &alice(), now).unwrap();

        let out = v.withdraw(&mut t, &alice(), now + 2 * WEEK).unwrap();
        assert_eq!(out.principal, 2 * ONE);
        let live: Vec<usize> = v.locks_of(&alice()).iter().map(|(i, _)| *i).collect();
        assert_eq!(live, vec![0]);
        assert_eq!(v.total_principal(), ONE);
        assert_eq!(v.total_supply(), v.shares_of(&alice()));
    }

    #[test]
    fn withdraw_lock_settles_one() {
        let mut t = funded(&[(alice(), 2 * ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        v.deposit(&mut t, &alice(), ONE, 1, &alice(), now).unwrap();
        v.deposit(&mut t, &alice(), ONE, 5, &alice(), now).unwrap();

        let err = v.withdraw_lock(&mut t, &alice(), 1, now + WEEK).unwrap_err();
        assert_eq!(err, KilnError::Vault(VaultError::TooEarly { maturity: now + 5 * WEEK }));

        let out = v.withdraw_lock(&mut t, &alice(), 0, now + WEEK).unwrap();
        assert_eq!(out.principal, ONE);

        let err = v.withdraw_lock(&mut t, &alice(), 0, now + WEEK).unwrap_err();
        assert_eq!(err, KilnError::Vault(VaultError::UnknownLock(0)));
        let err = v.withdraw_lock(&mut t, &alice(), 9, now + WEEK).unwrap_err();
        assert_eq!(err, KilnError::Vault(VaultError::UnknownLock(9)));
    }

    // ------------------------------------------------------------------
    // Deposit validation
    // ------------------------------------------------------------------

    #[test]
    fn deposit_before_start_is_rejected() {
        let mut t = funded(&[(alice(), ONE)]);
        let mut v = vault();
        let err = v.deposit(&mut t, &alice(), ONE, 1, &alice(), DEPLOY).unwrap_err();
        assert_eq!(err, KilnError::Vault(VaultError::NotStarted { opens_at: v.opens_at() }));
    }

    #[test]
    fn deposit_rejects_bad_inputs() {
        let mut t = funded(&[(alice(), ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        assert_eq!(
            v.deposit(&mut t, &alice(), 0, 1, &alice(), now).unwrap_err(),
            KilnError::Vault(VaultError::ZeroAmount)
        );
        assert_eq!(
            v.deposit(&mut t, &alice(), ONE, 0, &alice(), now).unwrap_err(),
            KilnError::Vault(VaultError::InvalidLockDuration(0))
        );
        assert_eq!(
            v.deposit(&mut t, &alice(), ONE, MAX_LOCK_WEEKS + 1, &alice(), now).unwrap_err(),
            KilnError::Vault(VaultError::InvalidLockDuration(MAX_LOCK_WEEKS + 1))
        );
    }

    #[test]
    fn failed_transfer_leaves_vault_untouched() {
        let mut t = funded(&[(alice(), ONE)]);
        let mut v = vault();
        let now = v.opens_at();
        let err = v.deposit(&mut t, &alice(), 2 * ONE, 1, &alice(), now).unwrap_err();
        assert_eq!(
            err,
            KilnError::Token(TokenError::InsufficientBalance { have: ONE, need: 2 * ONE })
        );
        assert_eq!(v.total_supply(), 0);
        assert_eq!(v.total_assets(), 0);
        assert!(v.locks_of(&alice()).is_empty());
        assert_eq!(v.user_assets_during(&alice(), v.start_week(), now), 0);
    }

    #[test]
    fn deposit_far_behind_requires_checkpoint() {
        let mut t = funded(&[(alice(), ONE)]);
        let mut v = LockVault::new(vault_addr(), DirectFarm::new(), DEPLOY, 4);
        let later = week_start(v.start_week() + 10);

        let err = v.deposit(&mut t, &alice(), ONE, 1, &alice(), later).unwrap_err();
        assert_eq!(err, KilnError::Series(SeriesError::CheckpointBehind { behind: 10 }));
        assert_eq!(t.balance_of(&alice()), ONE);

        while !v.checkpoint(later).is_caught_up() {}
        v.deposit(&mut t, &alice(), ONE, 1, &alice(), later).unwrap();
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    #[test]
    fn locked_history_is_weekly() {
        let mut t = funded(&[(alice(), 3 * ONE), (bob(), ONE)]);
        let mut v = vault();
        let w0 = v.start_week();
        let now = v.opens_at();

        v.deposit(&mut t, &alice(), 3 * ONE, 1, &alice(), now).unwrap();
        let next = week_start(w0 + 1);
        v.deposit(&mut t, &bob(), ONE, 2, &bob(), next).unwrap();
        v.withdraw(&mut t, &alice(), next + DAY).unwrap();

        let later = week_start(w0 + 5);
        v.checkpoint(later);
        v.user_checkpoint(&alice(), later);

        assert_eq!(v.total_assets_during(w0, later), 3 * ONE);
        assert_eq!(v.total_assets_during(w0 + 1, later), ONE);
        assert_eq!(v.total_assets_during(w0 + 4, later), ONE);
        assert_eq!(v.total_assets_during(w0 - 1, later), 0);
        assert_eq!(v.user_assets_during(&alice(), w0, later), 3 * ONE);
        assert_eq!(v.user_assets_during(&alice(), w0 + 1, later), 0);
        // Bob's history starts at his first deposit.
        assert_eq!(v.user_assets_during(&bob(), w0, later), 0);
        assert_eq!(v.user_assets_during(&bob(), w0 + 3, later), ONE);
        assert_eq!(LockedSupply::total_assets_during(&v, w0 + 1, later), ONE);
    }

    #[test]
    fn user_checkpoint_without_history_is_noop() {
        let mut v = vault();
        assert_eq!(v.user_checkpoint(&alice(), v.opens_at()), CheckpointProgress::default());
    }

    proptest! {
        #[test]
        fn shares_are_conserved(
            deposits in prop::collection::vec((ONE..1_000_000 * ONE, 1u64..=MAX_LOCK_WEEKS, 0usize..3), 1..12),
            yield_amount in 0u128..1_000 * ONE,
        ) {
            let accounts = [alice(), bob(), carol()];
            let mut t = token();
            let mut v = vault();
            let now = v.opens_at();
            for (amount, weeks, who) in &deposits {
                t.mint(&gov(), &accounts[*who], *amount, now).unwrap();
                v.deposit(&mut t, &accounts[*who], *amount, *weeks, &accounts[*who], now).unwrap();
            }
            if yield_amount > 0 {
                t.mint(&gov(), &gov(), yield_amount, now).unwrap();
                v.inject_yield(&mut t, &gov(), yield_amount, now).unwrap();
            }

            let shares: u128 = accounts.iter().map(|a| v.shares_of(a)).sum();
            prop_assert_eq!(v.total_supply(), shares);

            let end = now + MAX_LOCK_WEEKS * WEEK;
            let mut paid = 0u128;
            for account in &accounts {
                if let Ok(out) = v.withdraw(&mut t, account, end) {
                    prop_assert!(out.assets >= out.principal);
                    paid += out.assets;
                }
            }
            prop_assert_eq!(v.total_supply(), 0);
            prop_assert_eq!(v.total_principal(), 0);
            let deposited: u128 = deposits.iter().map(|(a, _, _)| *a).sum();
            prop_assert!(paid <= deposited + yield_amount);
            prop_assert!(deposited + yield_amount - paid <= accounts.len() as u128);
        }
    }
}
