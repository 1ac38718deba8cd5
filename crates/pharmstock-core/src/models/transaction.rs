//! Ledger entry model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{new_id, now_timestamp, Quantities};

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Stock bought from a distributor
    Purchase,
    /// Stock sold to a customer
    Sale,
    /// Stock returned by a customer
    Return,
    /// Non-commercial stock added (found, transferred in)
    Incoming,
    /// Non-commercial stock removed (damaged, expired, transferred out)
    Outgoing,
}

impl TransactionType {
    /// Whether the quantity leaves stock.
    pub fn is_outgoing(&self) -> bool {
        matches!(self, TransactionType::Sale | TransactionType::Outgoing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "PUR",
            TransactionType::Sale => "SALE",
            TransactionType::Return => "RET",
            TransactionType::Incoming => "IN",
            TransactionType::Outgoing => "OUT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PUR" => Some(TransactionType::Purchase),
            "SALE" => Some(TransactionType::Sale),
            "RET" => Some(TransactionType::Return),
            "IN" => Some(TransactionType::Incoming),
            "OUT" => Some(TransactionType::Outgoing),
            _ => None,
        }
    }
}

/// One immutable ledger fact.
///
/// Exactly one side carries the quantity: `outgoing` for SALE/OUTGOING,
/// `incoming` for everything else. The constructor is the only place the
/// side is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    pub txn_type: TransactionType,
    pub incoming: Quantities,
    pub outgoing: Quantities,
    /// Purchase price of one pack at the time of the movement
    pub unit_purchase_price: Decimal,
    /// Sale price of one pack at the time of the movement
    pub unit_sale_price: Decimal,
    pub notes: Option<String>,
    pub created_at: String,
}

impl LedgerEntry {
    /// Place a normalized quantity on the side implied by `txn_type`.
    pub fn new(product_id: &str, txn_type: TransactionType, quantity: Quantities) -> Self {
        let (incoming, outgoing) = if txn_type.is_outgoing() {
            (Quantities::zero(), quantity)
        } else {
            (quantity, Quantities::zero())
        };
        Self {
            id: new_id(),
            product_id: product_id.to_string(),
            batch_id: None,
            txn_type,
            incoming,
            outgoing,
            unit_purchase_price: Decimal::ZERO,
            unit_sale_price: Decimal::ZERO,
            notes: None,
            created_at: now_timestamp(),
        }
    }

    pub fn with_batch(mut self, batch_id: Option<&str>) -> Self {
        self.batch_id = batch_id.map(str::to_string);
        self
    }

    pub fn with_prices(mut self, unit_purchase_price: Decimal, unit_sale_price: Decimal) -> Self {
        self.unit_purchase_price = unit_purchase_price;
        self.unit_sale_price = unit_sale_price;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Quantity moved, whichever side holds it.
    pub fn quantity(&self) -> Quantities {
        if self.txn_type.is_outgoing() {
            self.outgoing
        } else {
            self.incoming
        }
    }

    /// Signed contribution to stock (incoming minus outgoing).
    pub fn net(&self) -> Quantities {
        self.incoming - self.outgoing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_roundtrip() {
        for txn_type in [
            TransactionType::Purchase,
            TransactionType::Sale,
            TransactionType::Return,
            TransactionType::Incoming,
            TransactionType::Outgoing,
        ] {
            assert_eq!(TransactionType::from_str(txn_type.as_str()), Some(txn_type));
        }
        assert_eq!(TransactionType::from_str("XFER"), None);
    }

    #[test]
    fn test_sale_uses_outgoing_side() {
        let entry = LedgerEntry::new("p1", TransactionType::Sale, Quantities::subitems(35));
        assert!(entry.incoming.is_zero());
        assert_eq!(entry.outgoing, Quantities::subitems(35));
        assert_eq!(entry.net().subitems, Decimal::from(-35));
    }

    #[test]
    fn test_return_uses_incoming_side() {
        let entry = LedgerEntry::new("p1", TransactionType::Return, Quantities::subitems(5));
        assert!(entry.outgoing.is_zero());
        assert_eq!(entry.quantity(), Quantities::subitems(5));
        assert_eq!(entry.net().subitems, Decimal::from(5));
    }
}
