//! Units of sale, quantities and stock levels.

use std::ops::{Add, AddAssign, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Physical form of a medicine.
///
/// Discrete forms are counted down to the single dose (tablet). Bulk forms are
/// counted by container (bottle, vial, tube) only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicineForm {
    Tablet,
    Capsule,
    Suppository,
    Syrup,
    Drops,
    Injection,
    Inhaler,
    Ointment,
}

impl MedicineForm {
    pub const ALL: [MedicineForm; 8] = [
        MedicineForm::Tablet,
        MedicineForm::Capsule,
        MedicineForm::Suppository,
        MedicineForm::Syrup,
        MedicineForm::Drops,
        MedicineForm::Injection,
        MedicineForm::Inhaler,
        MedicineForm::Ointment,
    ];

    /// Whether stock is tracked down to individual doses.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            MedicineForm::Tablet | MedicineForm::Capsule | MedicineForm::Suppository
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MedicineForm::Tablet => "tablet",
            MedicineForm::Capsule => "capsule",
            MedicineForm::Suppository => "suppository",
            MedicineForm::Syrup => "syrup",
            MedicineForm::Drops => "drops",
            MedicineForm::Injection => "injection",
            MedicineForm::Inhaler => "inhaler",
            MedicineForm::Ointment => "ointment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let lowered = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|form| form.as_str() == lowered)
    }
}

/// Per-product conversion table between the three units of sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFactors {
    /// Packs covered by one catalog entry (informational, usually 1)
    pub products_in_box: u32,
    /// Items (strips, bottles) inside one pack
    pub items_per_product: u32,
    /// Subitems (tablets) inside one item
    pub subitems_per_item: u32,
}

/// Largest accepted conversion factor.
pub const MAX_FACTOR: u32 = 1_000_000;

/// Largest quantity component, in any unit, a caller may submit.
const MAX_QUANTITY: i64 = 1_000_000_000_000;

impl ConversionFactors {
    /// Validated factors; every factor must lie in `1..=MAX_FACTOR`.
    pub fn new(
        products_in_box: u32,
        items_per_product: u32,
        subitems_per_item: u32,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("products_in_box", products_in_box),
            ("items_per_product", items_per_product),
            ("subitems_per_item", subitems_per_item),
        ] {
            if value < 1 {
                return Err(ValidationError::new(field, "conversion factor must be at least 1"));
            }
            if value > MAX_FACTOR {
                return Err(ValidationError::new(
                    field,
                    format!("conversion factor cannot exceed {}", MAX_FACTOR),
                ));
            }
        }
        Ok(Self {
            products_in_box,
            items_per_product,
            subitems_per_item,
        })
    }

    /// Factors forced into `1..=MAX_FACTOR`, for legacy records holding 0.
    pub fn clamped(products_in_box: u32, items_per_product: u32, subitems_per_item: u32) -> Self {
        Self {
            products_in_box: products_in_box.clamp(1, MAX_FACTOR),
            items_per_product: items_per_product.clamp(1, MAX_FACTOR),
            subitems_per_item: subitems_per_item.clamp(1, MAX_FACTOR),
        }
    }

    pub fn items_per_product(&self) -> Decimal {
        Decimal::from(self.items_per_product)
    }

    pub fn subitems_per_item(&self) -> Decimal {
        Decimal::from(self.subitems_per_item)
    }

    /// `subitems_per_item × items_per_product`
    pub fn subitems_per_box(&self) -> Decimal {
        self.subitems_per_item() * self.items_per_product()
    }
}

impl Default for ConversionFactors {
    fn default() -> Self {
        Self::clamped(1, 1, 1)
    }
}

/// A quantity expressed at the three granularities.
///
/// As caller input it is composite (1 box + 2 strips + 3 tablets). Once
/// normalized by a unit scheme it holds equivalents of one amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantities {
    pub boxes: Decimal,
    pub items: Decimal,
    pub subitems: Decimal,
}

impl Quantities {
    pub fn new(boxes: Decimal, items: Decimal, subitems: Decimal) -> Self {
        Self {
            boxes,
            items,
            subitems,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn boxes(n: impl Into<Decimal>) -> Self {
        Self {
            boxes: n.into(),
            ..Self::default()
        }
    }

    pub fn items(n: impl Into<Decimal>) -> Self {
        Self {
            items: n.into(),
            ..Self::default()
        }
    }

    pub fn subitems(n: impl Into<Decimal>) -> Self {
        Self {
            subitems: n.into(),
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.boxes.is_zero() && self.items.is_zero() && self.subitems.is_zero()
    }

    /// Reject negative, oversized and empty quantities.
    ///
    /// Components stay below 10^12 so that expanding them by the largest
    /// factors cannot leave the decimal range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let components = [self.boxes, self.items, self.subitems];
        if components.iter().any(|q| *q < Decimal::ZERO) {
            return Err(ValidationError::new("quantity", "quantities cannot be negative"));
        }
        if components.iter().any(|q| *q >= Decimal::from(MAX_QUANTITY)) {
            return Err(ValidationError::new(
                "quantity",
                format!("quantity components must stay below {}", MAX_QUANTITY),
            ));
        }
        if self.is_zero() {
            return Err(ValidationError::new("quantity", "quantity must be greater than zero"));
        }
        Ok(())
    }
}

impl Add for Quantities {
    type Output = Quantities;

    fn add(self, rhs: Quantities) -> Quantities {
        Quantities {
            boxes: self.boxes + rhs.boxes,
            items: self.items + rhs.items,
            subitems: self.subitems + rhs.subitems,
        }
    }
}

impl AddAssign for Quantities {
    fn add_assign(&mut self, rhs: Quantities) {
        *self = *self + rhs;
    }
}

impl Sub for Quantities {
    type Output = Quantities;

    fn sub(self, rhs: Quantities) -> Quantities {
        Quantities {
            boxes: self.boxes - rhs.boxes,
            items: self.items - rhs.items,
            subitems: self.subitems - rhs.subitems,
        }
    }
}

/// Cached on-hand stock of a product or batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Complete boxes (always 0 for bulk forms)
    pub boxes: Decimal,
    /// Complete items
    pub items: Decimal,
    /// Smallest units on hand (mirrors items for bulk forms)
    pub subitems: Decimal,
}

impl StockLevel {
    pub fn is_empty(&self) -> bool {
        self.subitems.is_zero() && self.items.is_zero()
    }
}
