//! # kiln-token — The protocol's emission token.
//!
//! - [`EmissionToken`] — balances plus two weekly supply histories: the
//!   realized total supply and the maximum supply reached within each week.
//! - [`MinterSet`] — the governance-controlled [`MinterRegistry`](kiln_core::traits::MinterRegistry)
//!   consulted on every mint.

pub mod minters;
pub mod token;

pub use minters::MinterSet;
pub use token::EmissionToken;
