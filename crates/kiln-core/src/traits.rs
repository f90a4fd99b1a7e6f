//! Trait interfaces between Kiln components and their collaborators.
//!
//! Collaborators outside the accounting core:
//! - [`MinterRegistry`] — who may mint the emission token (governance-toggled)
//! - [`YieldSource`] — where the lock vault parks its assets
//! - [`PoolRegistry`] — which pool ids the external pool factory has created
//!
//! Seams between Kiln's own components, so each can be tested against fakes:
//! - [`AssetLedger`] / [`RewardMinter`] — token movements (kiln-token implements)
//! - [`SupplyLedger`] — supply history (kiln-token implements)
//! - [`LockedSupply`] — locked-asset history (kiln-vault implements)
//! - [`RewardSchedule`] — finalized per-pool weekly budgets (kiln-rewards implements)

use crate::error::{KilnError, MathError};
use crate::time::{Timestamp, Week};
use crate::types::{Address, PoolId};
use std::collections::BTreeSet;

/// Authorization registry consulted on every mint.
pub trait MinterRegistry {
    fn is_minter(&self, account: &Address) -> bool;
}

/// External system holding the vault's assets and reporting their value.
///
/// The vault trusts [`total_balance`](Self::total_balance) as ground truth for
/// share pricing.
pub trait YieldSource {
    /// Park `amount` of the underlying asset.
    fn deposit(&mut self, amount: u128) -> Result<(), MathError>;

    /// Take `amount` back out. Fails if the source holds less.
    fn withdraw(&mut self, amount: u128) -> Result<(), KilnError>;

    /// Current value held, including accrued yield.
    fn total_balance(&self) -> u128;
}

/// Pool ids known to the external pool factory.
pub trait PoolRegistry {
    fn contains(&self, pid: PoolId) -> bool;
}

/// In-memory pool registry.
#[derive(Debug, Clone, Default)]
pub struct PoolDirectory {
    pools: BTreeSet<PoolId>,
}

impl PoolDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool id, as the factory's pool-creation event would.
    pub fn register(&mut self, pid: PoolId) -> bool {
        self.pools.insert(pid)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl PoolRegistry for PoolDirectory {
    fn contains(&self, pid: PoolId) -> bool {
        self.pools.contains(&pid)
    }
}

/// Balance movements on the underlying asset.
pub trait AssetLedger {
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), KilnError>;
}

/// Minting capability handed to reward payers.
pub trait RewardMinter {
    /// Mint `amount` to `to` on behalf of `caller`, who must be a minter.
    fn mint(&mut self, caller: &Address, to: &Address, amount: u128, now: Timestamp) -> Result<(), KilnError>;
}

/// Read access to the emission token's supply history.
pub trait SupplyLedger {
    fn total_supply_during(&self, week: Week, now: Timestamp) -> u128;
}

/// Read access to the amount of emission token locked away from circulation.
pub trait LockedSupply {
    fn total_assets_during(&self, week: Week, now: Timestamp) -> u128;
}

/// Finalized weekly budgets, split per pool.
pub trait RewardSchedule {
    /// Latest week whose budget is frozen, or `None` before the first one.
    fn last_finalized_week(&self) -> Option<Week>;

    /// Budget of `pid` for `week`; zero for weeks not yet finalized.
    fn pool_weekly_rewards(&self, pid: PoolId, week: Week) -> Result<u128, MathError>;
}
