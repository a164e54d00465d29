// Utility functions shared across modules
// Decimal/f64 conversion and exchange quantity rounding

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Quantize decimal value to step (floor to nearest step multiple)
pub fn quantize_decimal(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() || step.is_sign_negative() {
        return value;
    }

    let floored = (value / step).floor() * step;
    floored
        .round_dp_with_strategy(step.scale(), RoundingStrategy::ToNegativeInfinity)
        .normalize()
}

/// f64 -> Decimal, NaN/inf map to zero
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Parse a decimal string as the exchange sends it ("0.00100000").
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

pub fn datetime_from_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub fn timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Percent distance of `a` from `b` (|a-b| / b * 100). Zero when `b` is zero.
pub fn pct_distance(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    (a - b).abs() / b.abs() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantize_floors_to_step() {
        assert_eq!(quantize_decimal(dec!(1.23456), dec!(0.001)), dec!(1.234));
        assert_eq!(quantize_decimal(dec!(0.0009), dec!(0.001)), dec!(0));
        assert_eq!(quantize_decimal(dec!(17), dec!(5)), dec!(15));
        assert_eq!(quantize_decimal(dec!(1.5), dec!(0)), dec!(1.5));
    }

    #[test]
    fn to_decimal_keeps_short_fractions_clean() {
        assert_eq!(to_decimal(0.5), dec!(0.5));
        assert_eq!(to_decimal(0.15), dec!(0.15));
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn pct_distance_handles_zero_base() {
        assert!((pct_distance(100.3, 100.0) - 0.3).abs() < 1e-9);
        assert_eq!(pct_distance(1.0, 0.0), 0.0);
    }

    #[test]
    fn parses_exchange_decimal_strings() {
        assert_eq!(parse_decimal("0.00100000"), Some(dec!(0.001)));
        assert_eq!(parse_decimal("abc"), None);
    }
}
