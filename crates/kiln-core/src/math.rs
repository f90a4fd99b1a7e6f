//! Fixed-point integer arithmetic.
//!
//! Amounts are `u128`. Products that can exceed 128 bits go through 256-bit
//! intermediates and must fit back into `u128`. All division rounds down.

use ethnum::U256;

use crate::constants::{BPS_PRECISION, ONE};
use crate::error::MathError;

fn narrow(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.as_u128())
}

/// `a * b / denominator`, rounding down, with a 256-bit intermediate product.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(denominator))
}

/// `a * b / denominator`, rounding up.
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let d = U256::from(denominator);
    let mut q = product / d;
    if product % d != U256::ZERO {
        q += U256::ONE;
    }
    narrow(q)
}

pub fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

/// Convert basis points to a ONE-scaled fraction.
pub fn bps_to_fraction(bps: u64) -> u128 {
    ONE / BPS_PRECISION as u128 * bps as u128
}

/// Fixed-point exponentiation: `(base / ONE)^exp`, ONE-scaled.
///
/// Binary exponentiation; each intermediate product is truncated back to the
/// ONE scale, so the result rounds down.
pub fn pow_fraction(base: u128, exp: u64) -> Result<u128, MathError> {
    if exp == 0 {
        return Ok(ONE);
    }

    let mut result = ONE;
    let mut b = base;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = mul_div(result, b, ONE)?;
        }
        e >>= 1;
        if e > 0 {
            b = mul_div(b, b, ONE)?;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mul_div_exceeds_128_bit_product() {
        // (2^100 * 2^100) / 2^90 = 2^110
        let a = 1u128 << 100;
        assert_eq!(mul_div(a, a, 1u128 << 90).unwrap(), 1u128 << 110);
    }

    #[test]
    fn mul_div_rounds_down() {
        assert_eq!(mul_div(10, 10, 3).unwrap(), 33);
        assert_eq!(mul_div_up(10, 10, 3).unwrap(), 34);
        assert_eq!(mul_div_up(10, 9, 3).unwrap(), 30);
    }

    #[test]
    fn mul_div_rejects_zero_denominator() {
        assert_eq!(mul_div(1, 1, 0), Err(MathError::DivisionByZero));
        assert_eq!(mul_div_up(1, 1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn mul_div_overflowing_quotient() {
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(MathError::Overflow));
    }

    #[test]
    fn checked_helpers() {
        assert_eq!(checked_add(u128::MAX, 1), Err(MathError::Overflow));
        assert_eq!(checked_sub(0, 1), Err(MathError::Underflow));
        assert_eq!(checked_sub(5, 3), Ok(2));
    }

    #[test]
    fn bps_fraction() {
        assert_eq!(bps_to_fraction(10_000), ONE);
        assert_eq!(bps_to_fraction(9_900), ONE / 100 * 99);
        assert_eq!(bps_to_fraction(0), 0);
    }

    #[test]
    fn pow_identities() {
        let half = ONE / 2;
        assert_eq!(pow_fraction(half, 0).unwrap(), ONE);
        assert_eq!(pow_fraction(half, 1).unwrap(), half);
        assert_eq!(pow_fraction(half, 3).unwrap(), ONE / 8);
        assert_eq!(pow_fraction(ONE, 1_000).unwrap(), ONE);
        assert_eq!(pow_fraction(0, 5).unwrap(), 0);
    }

    #[test]
    fn pow_decay_matches_repeated_multiplication() {
        let decay = bps_to_fraction(9_900);
        let mut expected = ONE;
        for _ in 0..10 {
            expected = mul_div(expected, decay, ONE).unwrap();
        }
        let got = pow_fraction(decay, 10).unwrap();
        // Both round down at every step; they may differ by a few units.
        assert!(got.abs_diff(expected) <= 10, "{got} vs {expected}");
    }

    proptest! {
        #[test]
        fn mul_div_matches_u128_when_it_fits(a in 0u128..(1 << 60), b in 0u128..(1 << 60), d in 1u128..u128::MAX) {
            prop_assert_eq!(mul_div(a, b, d).unwrap(), a * b / d);
        }

        #[test]
        fn pow_fraction_never_exceeds_one(base in 0u128..=ONE, exp in 0u64..200) {
            prop_assert!(pow_fraction(base, exp).unwrap() <= ONE);
        }
    }
}
