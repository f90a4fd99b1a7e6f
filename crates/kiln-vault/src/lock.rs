//! Per-account lock queue.
//!
//! An append-only arena of [`Lock`] records in deposit order, plus a cursor
//! to the first unsettled one. Settled locks stay in the arena (their index
//! is the lock's id) and are skipped on iteration.

use kiln_core::time::{Timestamp, Week};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub amount: u128,
    pub weeks: u64,
    pub deposited_week: Week,
    pub maturity: Timestamp,
    pub shares: u128,
    pub settled: bool,
}

impl Lock {
    pub fn is_matured(&self, now: Timestamp) -> bool {
        self.maturity <= now
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockQueue {
    locks: Vec<Lock>,
    head: usize,
}

impl LockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lock, returning its id.
    pub fn push(&mut self, lock: Lock) -> usize {
        self.locks.push(lock);
        self.locks.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Lock> {
        self.locks.get(index)
    }

    /// Unsettled locks with their ids, oldest first.
    pub fn live(&self) -> impl Iterator<Item = (usize, &Lock)> {
        self.locks
            .iter()
            .enumerate()
            .skip(self.head)
            .filter(|(_, lock)| !lock.settled)
    }

    /// Unsettled locks that have matured by `now`.
    pub fn matured(&self, now: Timestamp) -> impl Iterator<Item = (usize, &Lock)> {
        self.live().filter(move |(_, lock)| lock.is_matured(now))
    }

    /// Earliest maturity among unsettled locks.
    pub fn next_maturity(&self) -> Option<Timestamp> {
        self.live().map(|(_, lock)| lock.maturity).min()
    }

    /// Mark a lock settled and move the cursor past any settled prefix.
    ///
    /// Returns `false` if the lock does not exist or was already settled.
    pub fn settle(&mut self, index: usize) -> bool {
        match self.locks.get_mut(index) {
            Some(lock) if !lock.settled => lock.settled = true,
            _ => return false,
        }
        while self.head < self.locks.len() && self.locks[self.head].settled {
            self.head += 1;
        }
        true
    }

    pub fn has_live(&self) -> bool {
        self.live().next().is_some()
    }

    pub fn live_principal(&self) -> u128 {
        self.live().map(|(_, lock)| lock.amount).sum()
    }

    pub fn live_shares(&self) -> u128 {
        self.live().map(|(_, lock)| lock.shares).sum()
    }

    /// Total locks ever queued, settled or not.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Index of the first unsettled lock.
    pub fn head(&self) -> usize {
        self.head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(amount: u128, maturity: Timestamp) -> Lock {
        Lock {
            amount,
            weeks: 1,
            deposited_week: 0,
            maturity,
            shares: amount / 2,
            settled: false,
        }
    }

    #[test]
    fn push_assigns_sequential_ids() {
        let mut q = LockQueue::new();
        assert_eq!(q.push(lock(10, 100)), 0);
        assert_eq!(q.push(lock(20, 50)), 1);
        assert_eq!(q.len(), 2);
        assert_eq!(q.live_principal(), 30);
        assert_eq!(q.live_shares(), 15);
    }

    #[test]
    fn matured_ignores_queue_order() {
        let mut q = LockQueue::new();
        q.push(lock(10, 100));
        q.push(lock(20, 50));
        let ids: Vec<usize> = q.matured(60).map(|(i, _)| i).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(q.next_maturity(), Some(50));
    }

    #[test]
    fn settle_out_of_order_keeps_cursor_on_first_live() {
        let mut q = LockQueue::new();
        q.push(lock(10, 100));
        q.push(lock(20, 50));
        q.push(lock(30, 70));

        assert!(q.settle(1));
        assert_eq!(q.head(), 0);
        assert!(q.settle(0));
        assert_eq!(q.head(), 2);
        assert_eq!(q.live().map(|(i, _)| i).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn settle_twice_or_unknown_is_rejected() {
        let mut q = LockQueue::new();
        q.push(lock(10, 100));
        assert!(q.settle(0));
        assert!(!q.settle(0));
        assert!(!q.settle(5));
        assert!(!q.has_live());
        assert_eq!(q.next_maturity(), None);
    }
}
