//! Fixed-point rounding rules.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::ValidationError;

/// Decimal places of currency totals and display prices.
pub const CURRENCY_DP: u32 = 2;

/// Decimal places of quantities and per-unit prices.
pub const UNIT_DP: u32 = 6;

/// Total significant digits a stored value may carry.
pub const STORAGE_DIGITS: u32 = 18;

/// Half-up rounding to 2 decimals.
pub fn round_currency(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Half-up rounding to 6 decimals.
pub fn round_unit(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Reject values whose integer part does not fit an 18-digit column with
/// `places` fractional digits.
pub fn ensure_storable(
    field: &'static str,
    value: Decimal,
    places: u32,
) -> Result<(), ValidationError> {
    let limit = Decimal::from(10u64.pow(STORAGE_DIGITS - places));
    if value.abs() >= limit {
        return Err(ValidationError::new(
            field,
            format!("value {} exceeds storage precision", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_half_up() {
        assert_eq!(round_currency(dec("2.345")), dec("2.35"));
        assert_eq!(round_currency(dec("2.344")), dec("2.34"));
        assert_eq!(round_currency(dec("-2.345")), dec("-2.35"));
        assert_eq!(round_unit(dec("0.0000005")), dec("0.000001"));
    }

    #[test]
    fn test_storage_limit() {
        assert!(ensure_storable("x", dec("9999999999999999.99"), CURRENCY_DP).is_ok());
        assert!(ensure_storable("x", dec("10000000000000000"), CURRENCY_DP).is_err());
        assert!(ensure_storable("x", dec("999999999999.999999"), UNIT_DP).is_ok());
        assert!(ensure_storable("x", dec("1000000000000"), UNIT_DP).is_err());
    }
}
