//! Money helpers using rust_decimal for precision
//!
//! All monetary arithmetic runs on `Decimal`. Wholesale prices carry
//! the provider's 4-decimal precision, face values 2 decimals, and
//! sufficiency comparisons are done in minor units (cents) so the
//! threshold case never depends on floating-point rounding.

use rust_decimal::prelude::*;

/// Decimal places for wholesale (merchant cost) figures
pub const WHOLESALE_DECIMAL_PLACES: u32 = 4;

/// Decimal places for face-value (redeemable denomination) figures
pub const FACE_DECIMAL_PLACES: u32 = 2;

/// Round a wholesale amount to the provider's 4-decimal precision (half-up)
pub fn round_wholesale(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(WHOLESALE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a face-value amount to 2 decimals (half-up)
pub fn round_face(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FACE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a major-unit amount to minor units (cents), rounding half-up.
///
/// Used for the balance sufficiency comparison only; storage and
/// display stay in major units.
pub fn to_minor_units(value: Decimal) -> i64 {
    (value * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Line total for a purchase item: quantity × unit wholesale price,
/// at wholesale precision.
pub fn line_total(quantity: i32, unit_wholesale_price: Decimal) -> Decimal {
    round_wholesale(Decimal::from(quantity) * unit_wholesale_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn wholesale_rounds_to_four_places_half_up() {
        assert_eq!(round_wholesale(d("1.23455")), d("1.2346"));
        assert_eq!(round_wholesale(d("1.23454")), d("1.2345"));
    }

    #[test]
    fn face_rounds_to_two_places() {
        assert_eq!(round_face(d("9.995")), d("10.00"));
        assert_eq!(round_face(d("9.994")), d("9.99"));
    }

    #[test]
    fn minor_units_avoid_threshold_edge() {
        // 10.004999 vs a 10.00 balance: both land on 1000 cents,
        // so sufficiency holds exactly at the threshold.
        assert_eq!(to_minor_units(d("10.004999")), 1000);
        assert_eq!(to_minor_units(d("10.005")), 1001);
        assert_eq!(to_minor_units(d("0")), 0);
    }

    #[test]
    fn line_total_is_quantity_times_unit_price() {
        assert_eq!(line_total(3, d("8.1234")), d("24.3702"));
        assert_eq!(line_total(0, d("8.1234")), d("0.0000"));
    }
}
