//! # kiln-core
//! Foundation types, traits and the weekly checkpoint primitive for Kiln.

pub mod constants;
pub mod error;
pub mod math;
pub mod series;
pub mod time;
pub mod traits;
pub mod types;

pub use series::{CheckpointProgress, CheckpointSeries, FuturePolicy};
pub use types::{Address, PoolId};
