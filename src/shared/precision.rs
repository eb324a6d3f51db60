//! Pure precision math for prices and amounts.
//!
//! All math uses `rust_decimal::Decimal` for exact arithmetic.
//! No async, no network calls. Returns `None` on a non-positive step or overflow.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places implied by a tick or lot step (`0.01` → 2, `10` → 0).
pub fn decimals_of_step(step: Decimal) -> u32 {
    step.normalize().scale()
}

/// Whether `value` can be represented with at most `decimals` decimal places.
pub fn fits_decimals(value: Decimal, decimals: u32) -> bool {
    value.normalize().scale() <= decimals
}

/// Round `value` to the nearest multiple of `step`; midpoints round away from zero.
pub fn round_to_step(value: Decimal, step: Decimal) -> Option<Decimal> {
    if step <= Decimal::ZERO {
        return None;
    }
    let units = value
        .checked_div(step)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    units.checked_mul(step).map(|v| v.normalize())
}

/// Truncate `value` toward zero to a multiple of `step`.
pub fn truncate_to_step(value: Decimal, step: Decimal) -> Option<Decimal> {
    if step <= Decimal::ZERO {
        return None;
    }
    let units = value.checked_div(step)?.trunc();
    units.checked_mul(step).map(|v| v.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_decimals_of_step() {
        assert_eq!(decimals_of_step(d("0.01000000")), 2);
        assert_eq!(decimals_of_step(d("0.00001")), 5);
        assert_eq!(decimals_of_step(d("1")), 0);
        assert_eq!(decimals_of_step(d("10")), 0);
    }

    #[test]
    fn test_fits_decimals_ignores_trailing_zeros() {
        assert!(fits_decimals(d("1.5000"), 1));
        assert!(!fits_decimals(d("1.55"), 1));
        assert!(fits_decimals(d("100"), 0));
    }

    #[test]
    fn test_round_to_step() {
        assert_eq!(round_to_step(d("101.234"), d("0.01")), Some(d("101.23")));
        assert_eq!(round_to_step(d("101.235"), d("0.01")), Some(d("101.24")));
        assert_eq!(round_to_step(d("-1.005"), d("0.01")), Some(d("-1.01")));
        assert_eq!(round_to_step(d("17"), d("5")), Some(d("15")));
        assert_eq!(round_to_step(d("1"), Decimal::ZERO), None);
    }

    #[test]
    fn test_truncate_to_step() {
        assert_eq!(truncate_to_step(d("0.123456"), d("0.0001")), Some(d("0.1234")));
        assert_eq!(truncate_to_step(d("0.99999"), d("0.1")), Some(d("0.9")));
        assert_eq!(truncate_to_step(d("-0.99"), d("0.1")), Some(d("-0.9")));
        assert_eq!(truncate_to_step(d("3"), d("-1")), None);
    }
}
