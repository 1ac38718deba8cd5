//! Catalog product model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ConversionFactors, MedicineForm, StockLevel};
use crate::pricing::{Discount, PriceBreakdown, PricingInput};
use crate::stock::{scheme_for, UnitScheme};

/// One medicine in the pharmacy catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier
    pub id: String,
    pub name: String,
    pub category_id: Option<i64>,
    /// Free text strength or volume (e.g. "500mg", "120mL")
    pub strength: Option<String>,
    /// Shelf location
    pub rack_no: Option<String>,
    pub medicine_form: MedicineForm,
    pub factors: ConversionFactors,
    /// Sales draw from batches in FEFO order
    pub track_batches: bool,
    /// Derived prices
    pub pricing: PriceBreakdown,
    /// Cached stock, derived from the ledger
    pub stock: StockLevel,
    /// Base units oversold beyond zero, derived from the ledger
    pub stock_deficit: Decimal,
    pub created_at: String,
    pub updated_at: String,
}

impl Product {
    /// Unit strategy matching this product's form.
    pub fn unit_scheme(&self) -> Box<dyn UnitScheme> {
        scheme_for(self.medicine_form, self.factors)
    }

    /// Sale price of one pack, if one is configured.
    pub fn sale_price(&self) -> Option<Decimal> {
        self.pricing.sale_price
    }

    /// Net purchase price of one pack.
    pub fn net_price(&self) -> Decimal {
        self.pricing.net_price
    }
}

/// Catalog fields for a new product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category_id: Option<i64>,
    pub strength: Option<String>,
    pub rack_no: Option<String>,
    pub medicine_form: MedicineForm,
    pub factors: ConversionFactors,
    pub track_batches: bool,
    pub pricing: PricingInput,
}

impl NewProduct {
    /// Create catalog fields with required values.
    pub fn new(
        name: String,
        medicine_form: MedicineForm,
        factors: ConversionFactors,
        gross_price: Decimal,
    ) -> Self {
        Self {
            name,
            category_id: None,
            strength: None,
            rack_no: None,
            medicine_form,
            factors,
            track_batches: false,
            pricing: PricingInput::new(gross_price),
        }
    }

    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.pricing.discount = discount;
        self
    }

    pub fn with_margin(mut self, margin_percent: Decimal) -> Self {
        self.pricing.margin_percent = margin_percent;
        self
    }

    pub fn with_sale_price(mut self, sale_price: Decimal) -> Self {
        self.pricing.sale_price = Some(sale_price);
        self
    }

    pub fn with_batch_tracking(mut self) -> Self {
        self.track_batches = true;
        self
    }
}
