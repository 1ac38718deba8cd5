//! Distributor (supplier) payables models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A supplier with cached payable totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distributor {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Sum of all purchase invoices (cached)
    pub total_purchases: Decimal,
    /// Sum of all payments (cached)
    pub total_paid: Decimal,
    pub created_at: String,
}

impl Distributor {
    /// `total_purchases − total_paid`
    pub fn balance_due(&self) -> Decimal {
        self.total_purchases - self.total_paid
    }

    pub fn is_paid(&self) -> bool {
        self.balance_due() <= Decimal::ZERO
    }
}

/// A purchase invoice from a distributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorPurchase {
    pub id: String,
    pub distributor_id: String,
    pub invoice_no: Option<String>,
    pub amount: Decimal,
    pub purchase_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: String,
}

/// A payment made to a distributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorPayment {
    pub id: String,
    pub distributor_id: String,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    /// Cash, cheque, bank transfer...
    pub method: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}
