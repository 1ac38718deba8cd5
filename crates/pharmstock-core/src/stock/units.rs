//! Unit schemes: how a medicine form counts its stock.

use rust_decimal::Decimal;

use crate::models::{ConversionFactors, MedicineForm, Quantities, StockLevel};
use crate::pricing::{round_currency, round_unit};

/// Requested base units exceed what is on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: Decimal,
    pub available: Decimal,
}

/// Counting strategy for one medicine form.
pub trait UnitScheme: Send + Sync {
    fn factors(&self) -> &ConversionFactors;

    /// Name of the authoritative unit, for messages.
    fn base_unit(&self) -> &'static str;

    /// Expand a composite quantity into equivalents at all three granularities.
    ///
    /// Expects input that passed [`Quantities::validate`]; within those
    /// bounds and the factor limit the expansion cannot overflow.
    fn normalize(&self, quantity: &Quantities) -> Quantities;

    /// The authoritative count held in a normalized quantity.
    fn base_units(&self, normalized: &Quantities) -> Decimal;

    /// Base units in one pack.
    fn base_units_per_box(&self) -> Decimal;

    /// Currency value of a normalized quantity at `pack_price`.
    ///
    /// Priced from the exact base count; the 6-decimal pack equivalent would
    /// drift by a cent on large packs.
    fn pack_value(&self, pack_price: Decimal, normalized: &Quantities) -> Decimal {
        round_currency(pack_price * self.base_units(normalized) / self.base_units_per_box())
    }

    /// Split a non-negative base-unit count into complete boxes and items.
    fn decompose(&self, net: Decimal) -> StockLevel;

    /// Stock left after selling `requested` out of `available` base units.
    fn consume_for_sale(
        &self,
        available: Decimal,
        requested: &Quantities,
    ) -> Result<StockLevel, Shortfall> {
        let wanted = self.base_units(&self.normalize(requested));
        if wanted > available {
            return Err(Shortfall {
                requested: wanted,
                available,
            });
        }
        Ok(self.decompose(available - wanted))
    }
}

/// Tablets, capsules, suppositories: counted to the single dose.
#[derive(Debug, Clone, Copy)]
pub struct DiscreteUnitScheme {
    factors: ConversionFactors,
}

impl DiscreteUnitScheme {
    pub fn new(factors: ConversionFactors) -> Self {
        Self { factors }
    }
}

impl UnitScheme for DiscreteUnitScheme {
    fn factors(&self) -> &ConversionFactors {
        &self.factors
    }

    fn base_unit(&self) -> &'static str {
        "subitems"
    }

    fn normalize(&self, quantity: &Quantities) -> Quantities {
        let subitems = quantity.boxes * self.factors.subitems_per_box()
            + quantity.items * self.factors.subitems_per_item()
            + quantity.subitems;
        Quantities {
            boxes: round_unit(subitems / self.factors.subitems_per_box()),
            items: round_unit(subitems / self.factors.subitems_per_item()),
            subitems: round_unit(subitems),
        }
    }

    fn base_units(&self, normalized: &Quantities) -> Decimal {
        normalized.subitems
    }

    fn base_units_per_box(&self) -> Decimal {
        self.factors.subitems_per_box()
    }

    fn decompose(&self, net: Decimal) -> StockLevel {
        let per_box = self.factors.subitems_per_box();
        let complete_boxes = (net / per_box).floor();
        let remainder = net - complete_boxes * per_box;
        let items_from_remainder = (remainder / self.factors.subitems_per_item()).floor();
        StockLevel {
            boxes: complete_boxes,
            items: complete_boxes * self.factors.items_per_product() + items_from_remainder,
            subitems: net,
        }
    }
}

/// Syrups, drops, injections, inhalers, ointments: counted by container.
#[derive(Debug, Clone, Copy)]
pub struct BulkUnitScheme {
    factors: ConversionFactors,
}

impl BulkUnitScheme {
    pub fn new(factors: ConversionFactors) -> Self {
        Self { factors }
    }
}

impl UnitScheme for BulkUnitScheme {
    fn factors(&self) -> &ConversionFactors {
        &self.factors
    }

    fn base_unit(&self) -> &'static str {
        "items"
    }

    fn normalize(&self, quantity: &Quantities) -> Quantities {
        // A container has no smaller dispensable unit; subitems count as items.
        let items =
            quantity.boxes * self.factors.items_per_product() + quantity.items + quantity.subitems;
        Quantities {
            boxes: round_unit(items / self.factors.items_per_product()),
            items: round_unit(items),
            subitems: round_unit(items),
        }
    }

    fn base_units(&self, normalized: &Quantities) -> Decimal {
        normalized.items
    }

    fn base_units_per_box(&self) -> Decimal {
        self.factors.items_per_product()
    }

    fn decompose(&self, net: Decimal) -> StockLevel {
        StockLevel {
            boxes: Decimal::ZERO,
            items: net,
            subitems: net,
        }
    }
}

/// Scheme for a medicine form.
pub fn scheme_for(form: MedicineForm, factors: ConversionFactors) -> Box<dyn UnitScheme> {
    if form.is_discrete() {
        Box::new(DiscreteUnitScheme::new(factors))
    } else {
        Box::new(BulkUnitScheme::new(factors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn ten_by_ten() -> ConversionFactors {
        ConversionFactors::new(1, 10, 10).unwrap()
    }

    #[test]
    fn test_discrete_normalize_composite() {
        let scheme = DiscreteUnitScheme::new(ten_by_ten());
        let normalized = scheme.normalize(&Quantities::new(dec(1), dec(2), dec(3)));
        assert_eq!(normalized.subitems, dec(123));
        assert_eq!(normalized.items, Decimal::new(123, 1));
        assert_eq!(normalized.boxes, Decimal::new(123, 2));
    }

    #[test]
    fn test_discrete_decompose() {
        let scheme = DiscreteUnitScheme::new(ten_by_ten());
        assert_eq!(
            scheme.decompose(dec(65)),
            StockLevel {
                boxes: dec(0),
                items: dec(6),
                subitems: dec(65)
            }
        );
        assert_eq!(
            scheme.decompose(dec(100)),
            StockLevel {
                boxes: dec(1),
                items: dec(10),
                subitems: dec(100)
            }
        );
        assert_eq!(scheme.decompose(dec(257)).items, dec(25));
    }

    #[test]
    fn test_bulk_ignores_boxes_in_stock() {
        let scheme = BulkUnitScheme::new(ConversionFactors::new(1, 12, 1).unwrap());
        let normalized = scheme.normalize(&Quantities::boxes(2));
        assert_eq!(normalized.items, dec(24));
        assert_eq!(normalized.subitems, dec(24));
        assert_eq!(normalized.boxes, dec(2));
        assert_eq!(
            scheme.decompose(dec(24)),
            StockLevel {
                boxes: dec(0),
                items: dec(24),
                subitems: dec(24)
            }
        );
    }

    #[test]
    fn test_pack_value_uses_exact_base_count() {
        // 11 of 21 tablets at 500 a pack is 261.904..., not 500 × 0.52381
        let scheme = DiscreteUnitScheme::new(ConversionFactors::new(1, 3, 7).unwrap());
        let normalized = scheme.normalize(&Quantities::subitems(11));
        assert_eq!(normalized.boxes, Decimal::new(523810, 6));
        assert_eq!(scheme.pack_value(dec(500), &normalized), Decimal::new(26190, 2));

        let bulk = BulkUnitScheme::new(ConversionFactors::new(1, 12, 1).unwrap());
        let normalized = bulk.normalize(&Quantities::items(5));
        assert_eq!(bulk.pack_value(dec(1200), &normalized), dec(500));
    }

    #[test]
    fn test_normalize_largest_accepted_input() {
        use crate::models::MAX_FACTOR;

        let factors = ConversionFactors::new(1, MAX_FACTOR, MAX_FACTOR).unwrap();
        let largest = Decimal::new(999_999_999_999, 0);
        let quantity = Quantities::new(largest, largest, largest);
        assert!(quantity.validate().is_ok());

        let normalized = DiscreteUnitScheme::new(factors).normalize(&quantity);
        assert!(normalized.subitems > largest);
        let normalized = BulkUnitScheme::new(factors).normalize(&quantity);
        assert!(normalized.items > largest);
    }

    #[test]
    fn test_consume_for_sale() {
        let scheme = DiscreteUnitScheme::new(ten_by_ten());
        let left = scheme.consume_for_sale(dec(100), &Quantities::subitems(35)).unwrap();
        assert_eq!(left.subitems, dec(65));

        let err = scheme.consume_for_sale(dec(10), &Quantities::items(2)).unwrap_err();
        assert_eq!(err.requested, dec(20));
        assert_eq!(err.available, dec(10));
    }

    #[test]
    fn test_scheme_for_form() {
        assert_eq!(scheme_for(MedicineForm::Capsule, ten_by_ten()).base_unit(), "subitems");
        assert_eq!(scheme_for(MedicineForm::Drops, ten_by_ten()).base_unit(), "items");
    }
}
