//! Rounding of aggregate metrics.
//!
//! Aggregates are published with [`METRIC_SCALE`] fractional digits, rounded half to even.
//! Anything comparing against the live aggregates has to round through [`round_metric`] or
//! it will see differences in the last digit.

use bigdecimal::{BigDecimal, RoundingMode};

/// Number of fractional digits of a published metric.
pub const METRIC_SCALE: i64 = 5;

/// Rounds `value` to [`METRIC_SCALE`] fractional digits, ties to even.
pub fn round_metric(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(METRIC_SCALE, RoundingMode::HalfEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn ties_round_to_even() {
        assert_eq!(round_metric(&decimal("1.234565")), decimal("1.23456"));
        assert_eq!(round_metric(&decimal("1.234575")), decimal("1.23458"));
        assert_eq!(round_metric(&decimal("-2.000005")), decimal("-2.00000"));
    }

    #[test]
    fn non_ties_round_to_nearest() {
        assert_eq!(round_metric(&decimal("3.6666666")), decimal("3.66667"));
        assert_eq!(round_metric(&decimal("3.5")), decimal("3.50000"));
        assert_eq!(round_metric(&decimal("3.5")).as_bigint_and_exponent().1, 5);
    }
}
