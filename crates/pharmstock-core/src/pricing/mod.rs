//! Purchase and sale price derivation.
//!
//! Pipeline: gross pack price → distributor discount → net pack price →
//! per-item and per-subitem prices, with the sale side derived from an
//! explicit sale price or a margin over the net price.

mod rounding;

pub use rounding::*;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{ConversionFactors, ValidationError};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Margins at or above this percentage are rejected.
pub const MAX_MARGIN_PERCENT: i64 = 10_000;

/// Distributor discount on the gross pack price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discount {
    #[default]
    None,
    /// Percentage of the gross price
    Percent(Decimal),
    /// Flat currency amount off the gross price
    Amount(Decimal),
}

impl Discount {
    /// Build from the two form fields, of which at most one may be non-zero.
    pub fn from_fields(percent: Decimal, amount: Decimal) -> Result<Self, ValidationError> {
        if percent < Decimal::ZERO {
            return Err(ValidationError::new("discount_percent", "cannot be negative"));
        }
        if amount < Decimal::ZERO {
            return Err(ValidationError::new("discount_amount", "cannot be negative"));
        }
        match (percent.is_zero(), amount.is_zero()) {
            (true, true) => Ok(Discount::None),
            (true, false) => Ok(Discount::Amount(amount)),
            (false, true) => Ok(Discount::Percent(percent)),
            (false, false) => Err(ValidationError::new(
                "discount",
                "supply either a percent or an amount, not both",
            )),
        }
    }
}

/// Caller-supplied pricing fields for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingInput {
    /// Gross purchase price of one pack
    pub gross_price: Decimal,
    pub discount: Discount,
    /// Margin over the net price used when no sale price is given (0 = none)
    pub margin_percent: Decimal,
    /// Explicit sale price of one pack
    pub sale_price: Option<Decimal>,
}

impl PricingInput {
    pub fn new(gross_price: Decimal) -> Self {
        Self {
            gross_price,
            discount: Discount::None,
            margin_percent: Decimal::ZERO,
            sale_price: None,
        }
    }
}

/// Derived prices at every granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub gross_price: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    /// Net purchase price of one pack
    pub net_price: Decimal,
    pub price_per_item: Decimal,
    pub price_per_subitem: Decimal,
    pub margin_percent: Decimal,
    /// Sale price of one pack
    pub sale_price: Option<Decimal>,
    pub sale_price_per_item: Option<Decimal>,
    pub sale_price_per_subitem: Option<Decimal>,
}

/// Applies discount, margin and unit conversion for one product.
pub struct PricingCalculator {
    factors: ConversionFactors,
}

impl PricingCalculator {
    pub fn new(factors: ConversionFactors) -> Self {
        Self { factors }
    }

    /// Derive all prices from the caller's input.
    pub fn calculate(&self, input: &PricingInput) -> Result<PriceBreakdown, ValidationError> {
        if input.gross_price < Decimal::ZERO {
            return Err(ValidationError::new("gross_price", "cannot be negative"));
        }
        if input.margin_percent < Decimal::ZERO {
            return Err(ValidationError::new("margin_percent", "cannot be negative"));
        }
        if input.margin_percent >= Decimal::from(MAX_MARGIN_PERCENT) {
            return Err(ValidationError::new(
                "margin_percent",
                format!("must be below {} percent", MAX_MARGIN_PERCENT),
            ));
        }
        let gross = round_currency(input.gross_price);
        ensure_storable("gross_price", gross, CURRENCY_DP)?;

        let (discount_percent, discount_amount) = match input.discount {
            Discount::Amount(amount) => {
                let amount = round_currency(amount);
                if amount > gross {
                    return Err(ValidationError::new(
                        "discount_amount",
                        "discount exceeds the gross price",
                    ));
                }
                let percent = if gross.is_zero() {
                    Decimal::ZERO
                } else {
                    round_currency(amount / gross * HUNDRED)
                };
                (percent, amount)
            }
            Discount::Percent(percent) => {
                if percent > HUNDRED {
                    return Err(ValidationError::new(
                        "discount_percent",
                        "cannot exceed 100 percent",
                    ));
                }
                (round_currency(percent), round_currency(gross * percent / HUNDRED))
            }
            Discount::None => (Decimal::ZERO, Decimal::ZERO),
        };

        // Net is taken by subtraction so that net + discount == gross exactly.
        let net_price = gross - discount_amount;
        let (price_per_item, price_per_subitem) = self.split_pack_price(net_price);

        let sale_price = match input.sale_price {
            Some(explicit) if !explicit.is_zero() => {
                if explicit < Decimal::ZERO {
                    return Err(ValidationError::new("sale_price", "cannot be negative"));
                }
                Some(round_currency(explicit))
            }
            _ if input.margin_percent > Decimal::ZERO => {
                Some(sale_price_from_margin(net_price, input.margin_percent)?)
            }
            _ => None,
        };
        if let Some(price) = sale_price {
            ensure_storable("sale_price", price, CURRENCY_DP)?;
        }
        let sale_split = sale_price.map(|price| self.split_pack_price(price));

        Ok(PriceBreakdown {
            gross_price: gross,
            discount_percent,
            discount_amount,
            net_price,
            price_per_item,
            price_per_subitem,
            margin_percent: round_currency(input.margin_percent),
            sale_price,
            sale_price_per_item: sale_split.map(|(item, _)| item),
            sale_price_per_subitem: sale_split.map(|(_, subitem)| subitem),
        })
    }

    /// Split a pack price into (per item, per subitem), both at 6 decimals.
    ///
    /// The subitem price divides the unrounded item price so rounding does
    /// not compound across levels.
    pub fn split_pack_price(&self, pack_price: Decimal) -> (Decimal, Decimal) {
        let per_item = pack_price / self.factors.items_per_product();
        let per_subitem = per_item / self.factors.subitems_per_item();
        (round_unit(per_item), round_unit(per_subitem))
    }
}

/// `net × (1 + margin / 100)`, rounded for display.
pub fn sale_price_from_margin(
    net_price: Decimal,
    margin_percent: Decimal,
) -> Result<Decimal, ValidationError> {
    (Decimal::ONE + margin_percent / HUNDRED)
        .checked_mul(net_price)
        .map(round_currency)
        .ok_or_else(|| ValidationError::new("margin_percent", "sale price out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn calculator(items: u32, subitems: u32) -> PricingCalculator {
        PricingCalculator::new(ConversionFactors::new(1, items, subitems).unwrap())
    }

    #[test]
    fn test_percent_discount_scenario() {
        let mut input = PricingInput::new(dec("400"));
        input.discount = Discount::Percent(dec("10"));

        let prices = calculator(10, 10).calculate(&input).unwrap();
        assert_eq!(prices.discount_amount, dec("40"));
        assert_eq!(prices.net_price, dec("360"));
        assert_eq!(prices.price_per_item, dec("36"));
        assert_eq!(prices.price_per_subitem, dec("3.6"));
        assert_eq!(prices.sale_price, None);
    }

    #[test]
    fn test_amount_discount_backfills_percent() {
        let mut input = PricingInput::new(dec("250"));
        input.discount = Discount::Amount(dec("25"));

        let prices = calculator(1, 1).calculate(&input).unwrap();
        assert_eq!(prices.discount_percent, dec("10"));
        assert_eq!(prices.net_price, dec("225"));
    }

    #[test]
    fn test_amount_discount_on_free_product() {
        let mut input = PricingInput::new(Decimal::ZERO);
        input.discount = Discount::Amount(Decimal::ZERO);

        let prices = calculator(1, 1).calculate(&input).unwrap();
        assert_eq!(prices.discount_percent, Decimal::ZERO);
        assert_eq!(prices.net_price, Decimal::ZERO);
    }

    #[test]
    fn test_no_discount() {
        let prices = calculator(2, 5)
            .calculate(&PricingInput::new(dec("99.99")))
            .unwrap();
        assert_eq!(prices.net_price, dec("99.99"));
        assert_eq!(prices.discount_percent, Decimal::ZERO);
        assert_eq!(prices.discount_amount, Decimal::ZERO);
        assert_eq!(prices.price_per_item, dec("49.995"));
        assert_eq!(prices.price_per_subitem, dec("9.999"));
    }

    #[test]
    fn test_both_discount_fields_rejected() {
        let err = Discount::from_fields(dec("5"), dec("10")).unwrap_err();
        assert_eq!(err.field, "discount");
        assert_eq!(
            Discount::from_fields(Decimal::ZERO, dec("10")).unwrap(),
            Discount::Amount(dec("10"))
        );
        assert_eq!(
            Discount::from_fields(Decimal::ZERO, Decimal::ZERO).unwrap(),
            Discount::None
        );
    }

    #[test]
    fn test_discount_above_gross_rejected() {
        let mut input = PricingInput::new(dec("10"));
        input.discount = Discount::Amount(dec("11"));
        assert!(calculator(1, 1).calculate(&input).is_err());

        input.discount = Discount::Percent(dec("101"));
        assert!(calculator(1, 1).calculate(&input).is_err());
    }

    #[test]
    fn test_margin_applies_to_net_pack_price() {
        let mut input = PricingInput::new(dec("400"));
        input.discount = Discount::Percent(dec("10"));
        input.margin_percent = dec("25");

        let prices = calculator(10, 10).calculate(&input).unwrap();
        assert_eq!(prices.sale_price, Some(dec("450")));
        assert_eq!(prices.sale_price_per_item, Some(dec("45")));
        assert_eq!(prices.sale_price_per_subitem, Some(dec("4.5")));
    }

    #[test]
    fn test_explicit_sale_price_wins_over_margin() {
        let mut input = PricingInput::new(dec("100"));
        input.margin_percent = dec("50");
        input.sale_price = Some(dec("120"));

        let prices = calculator(4, 1).calculate(&input).unwrap();
        assert_eq!(prices.sale_price, Some(dec("120")));
        assert_eq!(prices.sale_price_per_item, Some(dec("30")));
    }

    #[test]
    fn test_unit_prices_keep_six_decimals() {
        let prices = calculator(3, 7).calculate(&PricingInput::new(dec("100"))).unwrap();
        assert_eq!(prices.price_per_item, dec("33.333333"));
        assert_eq!(prices.price_per_subitem, dec("4.761905"));
    }

    #[test]
    fn test_price_identity_with_awkward_percent() {
        let mut input = PricingInput::new(dec("99.99"));
        input.discount = Discount::Percent(dec("33.333"));

        let prices = calculator(1, 1).calculate(&input).unwrap();
        assert_eq!(prices.net_price + prices.discount_amount, prices.gross_price);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert!(calculator(1, 1).calculate(&PricingInput::new(dec("-1"))).is_err());

        let mut input = PricingInput::new(dec("10"));
        input.margin_percent = dec("-5");
        assert!(calculator(1, 1).calculate(&input).is_err());
    }

    #[test]
    fn test_huge_margin_rejected() {
        let mut input = PricingInput::new(dec("1000000000000000"));
        input.margin_percent = dec("100000000000000000000");
        let err = calculator(1, 1).calculate(&input).unwrap_err();
        assert_eq!(err.field, "margin_percent");

        // Within bounds, but the derived sale price no longer fits storage
        input.margin_percent = dec("9999.99");
        let err = calculator(1, 1).calculate(&input).unwrap_err();
        assert_eq!(err.field, "sale_price");

        let mut input = PricingInput::new(dec("1000"));
        input.margin_percent = dec("9999.99");
        let prices = calculator(1, 1).calculate(&input).unwrap();
        assert_eq!(prices.sale_price, Some(dec("100999.9")));
    }
}
