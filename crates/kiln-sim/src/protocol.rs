//! Full protocol composition.
//!
//! The [`Protocol`] struct owns one of each component and wires them
//! together: the token is the vault's asset ledger and every distributor's
//! reward minter, the vault is the controller's locked-supply source, and the
//! controller is every distributor's reward schedule. It acts as governance
//! for pool management and records everything it does in an append-only
//! event log.

use std::collections::BTreeMap;

use kiln_core::error::{KilnError, WeightError};
use kiln_core::time::{week_of, Timestamp, Week};
use kiln_core::traits::PoolDirectory;
use kiln_core::{Address, CheckpointProgress, PoolId};
use kiln_rewards::{ClaimRewards, PoolDistributor, RewardController, WeightRegistry};
use kiln_token::{EmissionToken, MinterSet};
use kiln_vault::{DirectFarm, LockVault, WithdrawPreview};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::settings::ProtocolConfig;

/// Ledger address the vault holds its assets under.
pub const VAULT_ADDRESS: Address = Address([
    0x4b, 0x49, 0x4c, 0x4e, 0x56, 0x41, 0x55, 0x4c, 0x54, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
]);

/// Minter address of the distributor for `pid`.
pub fn distributor_address(pid: PoolId) -> Address {
    let mut bytes = [0u8; 20];
    bytes[..4].copy_from_slice(b"KILN");
    bytes[4] = 0xd1;
    bytes[12..].copy_from_slice(&pid.0.to_be_bytes());
    Address(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Minted { to: Address, amount: u128, at: Timestamp },
    Locked { account: Address, amount: u128, weeks: u64, lock: usize, at: Timestamp },
    Unlocked { account: Address, principal: u128, assets: u128, at: Timestamp },
    YieldInjected { from: Address, amount: u128, at: Timestamp },
    PoolAdded { pid: PoolId, weight: u128, at: Timestamp },
    WeightUpdated { pid: PoolId, weight: u128, at: Timestamp },
    Staked { pid: PoolId, account: Address, amount: u128, at: Timestamp },
    Unstaked { pid: PoolId, account: Address, amount: u128, at: Timestamp },
    Claimed { claim: ClaimRewards, at: Timestamp },
    WeekFinalized { week: Week, budget: u128 },
}

/// One row of the weekly supply report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub week: Week,
    pub realized_supply: u128,
    pub maximum_supply: u128,
    pub locked: u128,
    /// Zero until the week is finalized.
    pub budget: u128,
    pub finalized: bool,
}

#[derive(Debug, Clone)]
pub struct Protocol {
    governance: Address,
    token: EmissionToken,
    vault: LockVault<DirectFarm>,
    controller: RewardController,
    distributors: BTreeMap<PoolId, PoolDistributor>,
    max_checkpoint_weeks: u64,
    events: Vec<Event>,
}

impl Protocol {
    /// Deploy every component at `deployed_at` under `governance`.
    pub fn new(config: &ProtocolConfig, governance: Address, deployed_at: Timestamp) -> Result<Self, KilnError> {
        let max_weeks = config.max_checkpoint_weeks;
        let mut minters = MinterSet::new(governance);
        minters.set_minter(&governance, governance, true)?;

        let protocol = Self {
            governance,
            token: EmissionToken::new(minters, deployed_at, max_weeks),
            vault: LockVault::new(VAULT_ADDRESS, DirectFarm::new(), deployed_at, max_weeks),
            controller: RewardController::new(
                config.schedule(),
                WeightRegistry::new(governance, PoolDirectory::new()),
                deployed_at,
                max_weeks,
            ),
            distributors: BTreeMap::new(),
            max_checkpoint_weeks: max_weeks,
            events: Vec::new(),
        };
        info!(
            %governance,
            deployed_at,
            start_week = protocol.controller.start_week(),
            vault_opens_at = protocol.vault.opens_at(),
            "protocol: deployed"
        );
        Ok(protocol)
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn token(&self) -> &EmissionToken {
        &self.token
    }

    pub fn vault(&self) -> &LockVault<DirectFarm> {
        &self.vault
    }

    pub fn controller(&self) -> &RewardController {
        &self.controller
    }

    pub fn distributor(&self, pid: PoolId) -> Option<&PoolDistributor> {
        self.distributors.get(&pid)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Mint fresh tokens to `to` as governance.
    pub fn mint(&mut self, to: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        self.token.mint(&self.governance, to, amount, now)?;
        self.events.push(Event::Minted { to: *to, amount, at: now });
        Ok(())
    }

    pub fn lock(&mut self, account: &Address, amount: u128, weeks: u64, now: Timestamp) -> Result<usize, KilnError> {
        let lock = self
            .vault
            .deposit(&mut self.token, account, amount, weeks, account, now)?;
        self.events.push(Event::Locked {
            account: *account,
            amount,
            weeks,
            lock,
            at: now,
        });
        Ok(lock)
    }

    /// Withdraw every matured lock of `account`.
    pub fn unlock(&mut self, account: &Address, now: Timestamp) -> Result<WithdrawPreview, KilnError> {
        let out = self.vault.withdraw(&mut self.token, account, now)?;
        self.events.push(Event::Unlocked {
            account: *account,
            principal: out.principal,
            assets: out.assets,
            at: now,
        });
        Ok(out)
    }

    pub fn inject_yield(&mut self, from: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        self.vault.inject_yield(&mut self.token, from, amount, now)?;
        self.events.push(Event::YieldInjected { from: *from, amount, at: now });
        Ok(())
    }

    /// Create pool `pid`, weight it, and authorize its distributor to mint.
    pub fn add_pool(&mut self, pid: PoolId, weight: u128, now: Timestamp) -> Result<(), KilnError> {
        let weights = self.controller.weights_mut();
        weights.pools_mut().register(pid);
        weights.add_pool(&self.governance, pid, weight, now)?;

        let address = distributor_address(pid);
        self.token
            .minters_mut()
            .set_minter(&self.governance, address, true)?;
        self.distributors.insert(
            pid,
            PoolDistributor::new(pid, address, now, self.max_checkpoint_weeks),
        );
        self.events.push(Event::PoolAdded { pid, weight, at: now });
        Ok(())
    }

    pub fn update_weight(&mut self, pid: PoolId, weight: u128, now: Timestamp) -> Result<(), KilnError> {
        self.controller
            .weights_mut()
            .update_weight(&self.governance, pid, weight, now)?;
        self.events.push(Event::WeightUpdated { pid, weight, at: now });
        Ok(())
    }

    pub fn stake(&mut self, pid: PoolId, account: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        self.distributor_mut(pid)?.deposit(account, amount, now)?;
        self.events.push(Event::Staked {
            pid,
            account: *account,
            amount,
            at: now,
        });
        Ok(())
    }

    pub fn unstake(&mut self, pid: PoolId, account: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError> {
        self.distributor_mut(pid)?.withdraw(account, amount, now)?;
        self.events.push(Event::Unstaked {
            pid,
            account: *account,
            amount,
            at: now,
        });
        Ok(())
    }

    /// Pay `account` its rewards from `pid`.
    ///
    /// Finalizes completed weeks first (one bounded round), so a claim made
    /// after a week ends pays that week without a separate checkpoint.
    pub fn claim(&mut self, pid: PoolId, account: &Address, now: Timestamp) -> Result<Option<ClaimRewards>, KilnError> {
        if !self.distributors.contains_key(&pid) {
            return Err(WeightError::UnknownPool(pid).into());
        }
        self.finalize_weeks(now)?;
        let distributor = self
            .distributors
            .get_mut(&pid)
            .ok_or(WeightError::UnknownPool(pid))?;
        let claim = distributor.claim_rewards(account, now, &self.controller, &mut self.token)?;
        if let Some(claim) = claim {
            self.events.push(Event::Claimed { claim, at: now });
        }
        Ok(claim)
    }

    /// One bounded accrual round for a single staker of `pid`.
    pub fn user_checkpoint(&mut self, pid: PoolId, account: &Address, now: Timestamp) -> Result<CheckpointProgress, KilnError> {
        Ok(self.distributor_mut(pid)?.user_checkpoint(account, now)?)
    }

    /// One bounded checkpoint round over every component.
    ///
    /// Returns the slowest component's progress; repeat until caught up.
    pub fn checkpoint_all(&mut self, now: Timestamp) -> Result<CheckpointProgress, KilnError> {
        let mut progress = self.token.checkpoint(now).merge(self.vault.checkpoint(now));
        progress = progress.merge(self.finalize_weeks(now)?);

        for distributor in self.distributors.values_mut() {
            progress = progress.merge(distributor.checkpoint(now)?);
        }
        debug!(advanced = progress.advanced, behind = progress.behind, "protocol: checkpoint");
        Ok(progress)
    }

    /// Checkpoint until every component reaches the week of `now`.
    pub fn catch_up(&mut self, now: Timestamp) -> Result<CheckpointProgress, KilnError> {
        let mut total = CheckpointProgress::default();
        loop {
            let progress = self.checkpoint_all(now)?;
            total.advanced += progress.advanced;
            total.behind = progress.behind;
            if progress.is_caught_up() {
                return Ok(total);
            }
        }
    }

    pub fn report(&self, week: Week, now: Timestamp) -> WeeklyReport {
        let finalized = self
            .controller
            .last_finalized_week()
            .is_some_and(|last| week <= last && week >= self.controller.start_week());
        WeeklyReport {
            week,
            realized_supply: self.token.total_supply_during(week, now),
            maximum_supply: self.token.maximum_total_supply_during(week, now),
            locked: self.vault.total_assets_during(week, now),
            budget: self.controller.weekly_rewards(week),
            finalized,
        }
    }

    /// Reports from the deployment week through the week of `now`.
    pub fn reports(&self, now: Timestamp) -> Vec<WeeklyReport> {
        (self.controller.start_week()..=week_of(now))
            .map(|week| self.report(week, now))
            .collect()
    }

    /// One bounded controller round, logging each newly frozen week.
    fn finalize_weeks(&mut self, now: Timestamp) -> Result<CheckpointProgress, KilnError> {
        let before = self.controller.last_checkpoint();
        let progress = self.controller.checkpoint(now, &self.token, &self.vault)?;
        for week in before..self.controller.last_checkpoint() {
            self.events.push(Event::WeekFinalized {
                week,
                budget: self.controller.weekly_rewards(week),
            });
        }
        Ok(progress)
    }

    fn distributor_mut(&mut self, pid: PoolId) -> Result<&mut PoolDistributor, WeightError> {
        self.distributors
            .get_mut(&pid)
            .ok_or(WeightError::UnknownPool(pid))
    }
}
