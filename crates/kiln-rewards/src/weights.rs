//! Governance-controlled pool weights with timestamped history.
//!
//! Every change appends `(timestamp, points)` to the pool's history and the
//! matching new total to the total's history, so any past relative weight can
//! be read back. Timestamps within a history never decrease; a change stamped
//! before the latest entry is recorded at the latest entry's time.

use std::collections::BTreeMap;

use kiln_core::constants::ONE;
use kiln_core::error::{KilnError, MathError, WeightError};
use kiln_core::math::{checked_add, checked_sub, mul_div};
use kiln_core::time::Timestamp;
use kiln_core::traits::{PoolDirectory, PoolRegistry};
use kiln_core::{Address, PoolId};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct History {
    entries: Vec<(Timestamp, u128)>,
}

impl History {
    fn latest(&self) -> u128 {
        self.entries.last().map_or(0, |(_, v)| *v)
    }

    fn latest_at(&self) -> Timestamp {
        self.entries.last().map_or(0, |(t, _)| *t)
    }

    fn at(&self, ts: Timestamp) -> u128 {
        let idx = self.entries.partition_point(|(t, _)| *t <= ts);
        if idx == 0 {
            return 0;
        }
        self.entries[idx - 1].1
    }

    fn push(&mut self, ts: Timestamp, value: u128) {
        let ts = ts.max(self.latest_at());
        self.entries.push((ts, value));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct WeightRegistry<P = PoolDirectory> {
    governance: Address,
    pools: P,
    weights: BTreeMap<PoolId, History>,
    total: History,
}

impl<P: PoolRegistry> WeightRegistry<P> {
    pub fn new(governance: Address, pools: P) -> Self {
        Self {
            governance,
            pools,
            weights: BTreeMap::new(),
            total: History::default(),
        }
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn pools(&self) -> &P {
        &self.pools
    }

    /// The pool factory, for registering newly created pools.
    pub fn pools_mut(&mut self) -> &mut P {
        &mut self.pools
    }

    /// Pools with a weight history, in id order.
    pub fn pool_ids(&self) -> impl Iterator<Item = PoolId> + '_ {
        self.weights.keys().copied()
    }

    pub fn add_pool(&mut self, caller: &Address, pid: PoolId, initial_weight: u128, now: Timestamp) -> Result<(), KilnError> {
        self.authorize(caller)?;
        if !self.pools.contains(pid) {
            return Err(WeightError::UnknownPool(pid).into());
        }
        if self.weights.contains_key(&pid) {
            return Err(WeightError::PoolExists(pid).into());
        }
        let total = checked_add(self.total.latest(), initial_weight)?;

        let mut history = History::default();
        history.push(now, initial_weight);
        self.weights.insert(pid, history);
        self.total.push(now, total);

        info!(%pid, weight = initial_weight, total, "weights: pool added");
        Ok(())
    }

    pub fn update_weight(&mut self, caller: &Address, pid: PoolId, new_weight: u128, now: Timestamp) -> Result<(), KilnError> {
        self.authorize(caller)?;
        let history = self.weights.get(&pid).ok_or(WeightError::UnknownPool(pid))?;
        let total = checked_sub(self.total.latest(), history.latest())?;
        let total = checked_add(total, new_weight)?;

        if let Some(history) = self.weights.get_mut(&pid) {
            history.push(now, new_weight);
        }
        self.total.push(now, total);

        info!(%pid, weight = new_weight, total, "weights: weight updated");
        Ok(())
    }

    pub fn weight_points(&self, pid: PoolId) -> u128 {
        self.weights.get(&pid).map_or(0, History::latest)
    }

    pub fn total_weight_points(&self) -> u128 {
        self.total.latest()
    }

    pub fn weight_points_at(&self, pid: PoolId, ts: Timestamp) -> u128 {
        self.weights.get(&pid).map_or(0, |h| h.at(ts))
    }

    pub fn total_weight_points_at(&self, ts: Timestamp) -> u128 {
        self.total.at(ts)
    }

    pub fn weight_points_len(&self, pid: PoolId) -> usize {
        self.weights.get(&pid).map_or(0, History::len)
    }

    pub fn total_weight_points_len(&self) -> usize {
        self.total.len()
    }

    /// Latest weight of `pid` as a ONE-scaled share of the total.
    pub fn relative_weight(&self, pid: PoolId) -> Result<u128, MathError> {
        relative(self.weight_points(pid), self.total_weight_points())
    }

    /// ONE-scaled share of the total held by `pid` at `ts`. Zero when the total is zero.
    pub fn relative_weight_at(&self, pid: PoolId, ts: Timestamp) -> Result<u128, MathError> {
        relative(self.weight_points_at(pid, ts), self.total_weight_points_at(ts))
    }

    fn authorize(&self, caller: &Address) -> Result<(), WeightError> {
        if *caller != self.governance {
            return Err(WeightError::Unauthorized(*caller));
        }
        Ok(())
    }
}

fn relative(points: u128, total: u128) -> Result<u128, MathError> {
    if total == 0 {
        return Ok(0);
    }
    mul_div(points, ONE, total)
}
