//! # kiln-vault — Duration-weighted lock vault.
//!
//! Holders lock the emission token for 1..=[`MAX_LOCK_WEEKS`](kiln_core::constants::MAX_LOCK_WEEKS)
//! weeks and receive vault shares weighted by lock duration. Each account
//! keeps a queue of independent locks; withdrawing settles every matured one
//! at once, paying back principal plus a share-weighted slice of the yield
//! the vault's [`YieldSource`](kiln_core::traits::YieldSource) has accrued.

pub mod lock;
pub mod vault;
pub mod yield_source;

pub use lock::{Lock, LockQueue};
pub use vault::{LockVault, WithdrawPreview};
pub use yield_source::{DirectFarm, FarmBar};
