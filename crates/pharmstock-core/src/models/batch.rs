//! Product batch (received lot) model.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Quantities, StockLevel};

/// One received lot of a product with its own expiry and pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,
    pub distributor_id: Option<String>,
    pub batch_no: String,
    pub expiry_date: Option<NaiveDate>,
    /// Normalized quantity received, fixed at creation
    pub initial: Quantities,
    /// Cached stock, derived from batch-tagged ledger entries
    pub current: StockLevel,
    /// Base units oversold beyond zero, derived from the ledger
    pub stock_deficit: Decimal,
    /// Overrides the product's net price when set
    pub purchase_price_per_pack: Option<Decimal>,
    /// Overrides the product's sale price when set
    pub sale_price_per_pack: Option<Decimal>,
    pub is_active: bool,
    /// Receipt order, used to break expiry ties
    pub received_seq: i64,
    pub created_at: String,
}

impl ProductBatch {
    /// Whether the batch is past its expiry on `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.map(|expiry| expiry < today).unwrap_or(false)
    }

    /// Batch sale price, falling back to the product's.
    pub fn effective_sale_price(&self, product_sale_price: Option<Decimal>) -> Option<Decimal> {
        self.sale_price_per_pack.or(product_sale_price)
    }

    /// Batch purchase price, falling back to the product's.
    pub fn effective_purchase_price(&self, product_net_price: Decimal) -> Decimal {
        self.purchase_price_per_pack.unwrap_or(product_net_price)
    }
}

/// Fields for receiving a new batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBatch {
    pub product_id: String,
    pub distributor_id: Option<String>,
    pub batch_no: String,
    pub expiry_date: Option<NaiveDate>,
    /// Quantity received (composite, normalized on receipt)
    pub quantity: Quantities,
    pub purchase_price_per_pack: Option<Decimal>,
    pub sale_price_per_pack: Option<Decimal>,
}

impl NewBatch {
    pub fn new(product_id: String, batch_no: String, quantity: Quantities) -> Self {
        Self {
            product_id,
            distributor_id: None,
            batch_no,
            expiry_date: None,
            quantity,
            purchase_price_per_pack: None,
            sale_price_per_pack: None,
        }
    }

    pub fn expiring(mut self, expiry_date: NaiveDate) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(expiry: Option<NaiveDate>) -> ProductBatch {
        ProductBatch {
            id: "b1".into(),
            product_id: "p1".into(),
            distributor_id: None,
            batch_no: "LOT-1".into(),
            expiry_date: expiry,
            initial: Quantities::subitems(100),
            current: StockLevel::default(),
            stock_deficit: Decimal::ZERO,
            purchase_price_per_pack: None,
            sale_price_per_pack: Some(Decimal::from(50)),
            is_active: true,
            received_seq: 1,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_expiry_check() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(batch(NaiveDate::from_ymd_opt(2024, 12, 31)).is_expired(today));
        assert!(!batch(NaiveDate::from_ymd_opt(2025, 1, 1)).is_expired(today));
        assert!(!batch(None).is_expired(today));
    }

    #[test]
    fn test_price_fallbacks() {
        let b = batch(None);
        assert_eq!(b.effective_sale_price(Some(Decimal::from(60))), Some(Decimal::from(50)));
        assert_eq!(b.effective_purchase_price(Decimal::from(40)), Decimal::from(40));
    }
}
