//! # kiln-rewards — Weekly reward budgets and their distribution.
//!
//! - [`WeightRegistry`]: governance-set pool weights with full history
//! - [`RewardController`]: freezes one emission budget per week, decaying
//!   after a ramp window, and splits it across pools by relative weight
//! - [`PoolDistributor`]: per-pool time-weighted balance points; pays each
//!   account its pro-rata share of every finalized week

pub mod controller;
pub mod distributor;
pub mod weights;

pub use controller::{EmissionSchedule, RewardController};
pub use distributor::{ClaimRewards, PoolDistributor};
pub use weights::WeightRegistry;
