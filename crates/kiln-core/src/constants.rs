//! Protocol constants. All token amounts are in base units (1 token = 10^18 units).

/// One whole token, also the fixed-point scale for fractions (relative weights, rates).
pub const ONE: u128 = 1_000_000_000_000_000_000;

pub const DAY: u64 = 86_400;
pub const WEEK: u64 = 7 * DAY;

/// Longest lock the vault accepts, in weeks (two years).
///
/// A lock of `MAX_LOCK_WEEKS` earns shares 1:1 with its amount; shorter locks
/// earn `weeks / MAX_LOCK_WEEKS` of that.
pub const MAX_LOCK_WEEKS: u64 = 104;

pub const BPS_PRECISION: u64 = 10_000;

/// Weekly emission rate during the ramp window: 1% of circulating supply.
pub const DEFAULT_WEEKLY_RATE_BPS: u64 = 100;

/// Per-week multiplicative decay applied after the ramp window (x0.99).
pub const DEFAULT_DECAY_BPS: u64 = 9_900;

/// Number of weeks after deployment that emit at the undecayed rate.
pub const DEFAULT_RAMP_WEEKS: u64 = 4;

/// Minimum weekly emission during the ramp window, in whole tokens.
///
/// Lets a fresh deployment emit before any circulating supply exists.
pub const DEFAULT_BOOTSTRAP_WEEKLY_TOKENS: u64 = 5_000;

/// Upper bound on weeks a single checkpoint call materializes.
///
/// Roughly ten years. A series further behind than this needs repeated
/// `checkpoint` calls before it accepts writes again.
pub const DEFAULT_MAX_CHECKPOINT_WEEKS: u64 = 520;
