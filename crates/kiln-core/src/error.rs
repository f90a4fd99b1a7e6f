//! Error types for the Kiln protocol.
//!
//! Every write either succeeds completely or returns one of these without
//! touching state. Conditions that are not failures (claiming nothing,
//! checkpointing an up-to-date series) are never reported here.
use thiserror::Error;

use crate::time::{Timestamp, Week};
use crate::types::{Address, PoolId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("arithmetic underflow")] Underflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("week {week} is frozen (last checkpoint {last_checkpoint})")] FrozenWeek { week: Week, last_checkpoint: Week },
    #[error("series is {behind} weeks behind; checkpoint first")] CheckpointBehind { behind: u64 },
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("unauthorized: {0}")] Unauthorized(Address),
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("vault not started: opens at {opens_at}")] NotStarted { opens_at: Timestamp },
    #[error("zero amount")] ZeroAmount,
    #[error("invalid lock duration: {0} weeks")] InvalidLockDuration(u64),
    #[error("no live locks")] NoLocks,
    #[error("withdrawal denied: nothing matured, next maturity {next_maturity}")] WithdrawalDenied { next_maturity: Timestamp },
    #[error("too early: lock matures at {maturity}")] TooEarly { maturity: Timestamp },
    #[error("unknown lock: {0}")] UnknownLock(usize),
    #[error("yield source short: have {have}, need {need}")] InsufficientAssets { have: u128, need: u128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeightError {
    #[error("unauthorized: {0}")] Unauthorized(Address),
    #[error("pool exists: {0}")] PoolExists(PoolId),
    #[error("unknown pool: {0}")] UnknownPool(PoolId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributorError {
    #[error("zero amount")] ZeroAmount,
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("accrual is {behind} weeks behind; checkpoint first")] AccrualBehind { behind: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KilnError {
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Series(#[from] SeriesError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Vault(#[from] VaultError),
    #[error(transparent)] Weight(#[from] WeightError),
    #[error(transparent)] Distributor(#[from] DistributorError),
}
