//! Distributor payables.
//!
//! Cached totals are always a full sum over the distributor's purchase and
//! payment rows, recomputed after every new row. They are never incremented.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::db::Database;
use crate::inventory::{InventoryError, InventoryResult};
use crate::models::{
    new_id, now_timestamp, Distributor, DistributorPayment, DistributorPurchase, ValidationError,
};
use crate::pricing::{ensure_storable, round_currency, CURRENCY_DP};

/// Supplier details for a new distributor.
#[derive(Debug, Clone, Default)]
pub struct NewDistributor {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Payables ledger over one database.
pub struct DistributorLedger<'a> {
    db: &'a Database,
}

impl<'a> DistributorLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create_distributor(&self, new: NewDistributor) -> InventoryResult<Distributor> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("name", "distributor name is required").into());
        }
        let distributor = Distributor {
            id: new_id(),
            name,
            phone: new.phone,
            address: new.address,
            total_purchases: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            created_at: now_timestamp(),
        };
        self.db.insert_distributor(&distributor)?;
        info!(distributor_id = %distributor.id, name = %distributor.name, "Created distributor");
        Ok(distributor)
    }

    pub fn get_distributor(&self, id: &str) -> InventoryResult<Distributor> {
        self.db
            .get_distributor(id)?
            .ok_or_else(|| InventoryError::not_found("distributor", id))
    }

    pub fn list_distributors(&self) -> InventoryResult<Vec<Distributor>> {
        Ok(self.db.list_distributors()?)
    }

    /// Record a purchase invoice and re-derive the balance.
    pub fn record_purchase(
        &self,
        distributor_id: &str,
        amount: Decimal,
        invoice_no: Option<String>,
        purchase_date: NaiveDate,
        notes: Option<String>,
    ) -> InventoryResult<Distributor> {
        let amount = validate_amount(amount)?;
        self.db.atomic(|db| {
            self.get_distributor(distributor_id)?;
            let purchase = DistributorPurchase {
                id: new_id(),
                distributor_id: distributor_id.to_string(),
                invoice_no,
                amount,
                purchase_date,
                notes,
                created_at: now_timestamp(),
            };
            db.insert_distributor_purchase(&purchase)?;
            info!(
                distributor_id,
                purchase_id = %purchase.id,
                amount = %amount,
                "Recorded distributor purchase"
            );
            self.recompute_totals(distributor_id)
        })
    }

    /// Record a payment and re-derive the balance.
    pub fn record_payment(
        &self,
        distributor_id: &str,
        amount: Decimal,
        payment_date: NaiveDate,
        method: Option<String>,
        notes: Option<String>,
    ) -> InventoryResult<Distributor> {
        let amount = validate_amount(amount)?;
        self.db.atomic(|db| {
            self.get_distributor(distributor_id)?;
            let payment = DistributorPayment {
                id: new_id(),
                distributor_id: distributor_id.to_string(),
                amount,
                payment_date,
                method,
                notes,
                created_at: now_timestamp(),
            };
            db.insert_distributor_payment(&payment)?;
            info!(
                distributor_id,
                payment_id = %payment.id,
                amount = %amount,
                "Recorded distributor payment"
            );
            self.recompute_totals(distributor_id)
        })
    }

    pub fn list_purchases(&self, distributor_id: &str) -> InventoryResult<Vec<DistributorPurchase>> {
        self.get_distributor(distributor_id)?;
        Ok(self.db.list_distributor_purchases(distributor_id)?)
    }

    pub fn list_payments(&self, distributor_id: &str) -> InventoryResult<Vec<DistributorPayment>> {
        self.get_distributor(distributor_id)?;
        Ok(self.db.list_distributor_payments(distributor_id)?)
    }

    /// Sum every purchase and payment row into the cached totals.
    fn recompute_totals(&self, distributor_id: &str) -> InventoryResult<Distributor> {
        let total_purchases: Decimal = self
            .db
            .list_distributor_purchases(distributor_id)?
            .iter()
            .map(|p| p.amount)
            .sum();
        let total_paid: Decimal = self
            .db
            .list_distributor_payments(distributor_id)?
            .iter()
            .map(|p| p.amount)
            .sum();

        self.db
            .update_distributor_totals(distributor_id, total_purchases, total_paid)?;
        let distributor = self.get_distributor(distributor_id)?;
        debug!(
            distributor_id,
            total_purchases = %total_purchases,
            total_paid = %total_paid,
            balance_due = %distributor.balance_due(),
            "Recomputed distributor totals"
        );
        Ok(distributor)
    }
}

fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    let amount = round_currency(amount);
    if amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount", "amount must be greater than zero"));
    }
    ensure_storable("amount", amount, CURRENCY_DP)?;
    Ok(amount)
}
