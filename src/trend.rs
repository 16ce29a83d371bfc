//! Trend comparison between adjacent training windows.
//!
//! Compares the trailing window's total hours against the preceding
//! non-overlapping band. A missing or zero baseline yields no signal rather
//! than an infinite or zero percentage.

use rust_decimal::Decimal;

/// Signed fractional change from `previous` to `current`.
///
/// Returns `None` when `previous <= 0`: with no positive baseline there is
/// no meaningful percentage, and treating it as 0% or infinity would either
/// hide or fabricate a spike. A result of `0.3` means +30%.
pub fn percent_change(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous <= Decimal::ZERO {
        return None;
    }
    Some((current - previous) / previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_baseline_yields_no_signal() {
        assert_eq!(percent_change(dec!(10), Decimal::ZERO), None);
        assert_eq!(percent_change(Decimal::ZERO, Decimal::ZERO), None);
    }

    #[test]
    fn negative_baseline_yields_no_signal() {
        assert_eq!(percent_change(dec!(10), dec!(-5)), None);
        assert_eq!(percent_change(dec!(-1), dec!(-5)), None);
    }

    #[test]
    fn ten_percent_increase() {
        assert_eq!(percent_change(dec!(110), dec!(100)), Some(dec!(0.1)));
    }

    #[test]
    fn large_increase_is_a_plain_fraction() {
        // 2h -> 5h week over week reads as +150%.
        assert_eq!(percent_change(dec!(5), dec!(2)), Some(dec!(1.5)));
    }

    #[test]
    fn decreases_are_negative() {
        assert_eq!(percent_change(dec!(2), dec!(5)), Some(dec!(-0.6)));
        assert_eq!(percent_change(Decimal::ZERO, dec!(4)), Some(dec!(-1)));
    }

    #[test]
    fn unchanged_load_is_zero() {
        assert_eq!(percent_change(dec!(7), dec!(7)), Some(Decimal::ZERO));
    }
}
