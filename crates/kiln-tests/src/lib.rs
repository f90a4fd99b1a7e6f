//! Cross-crate test suite for Kiln.
//!
//! Integration tests under `tests/` drive the token, vault, controller and
//! distributors together, either wired by hand or through
//! [`kiln_sim::Protocol`], and check the accounting invariants that only
//! hold across component boundaries.

pub mod helpers;
