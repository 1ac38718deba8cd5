//! Batch receipt and FEFO selection.

use rust_decimal::Decimal;
use tracing::info;

use super::{ensure_quantity_storable, DeficitPolicy, Inventory, InventoryError, InventoryResult};
use crate::models::{
    new_id, now_timestamp, LedgerEntry, NewBatch, Product, ProductBatch, Quantities, StockLevel,
    TransactionType, ValidationError,
};
use crate::pricing::{ensure_storable, round_currency, CURRENCY_DP};
use crate::stock::fefo_order;

impl<'a> Inventory<'a> {
    /// Create a batch and append its batch-tagged purchase in one unit of work.
    pub fn receive_batch(&self, new: NewBatch) -> InventoryResult<ProductBatch> {
        self.db.atomic(|_| {
            let product = self.require_product(&new.product_id)?;
            self.apply_batch_receipt(&product, &new)
        })
    }

    /// Validate and insert a batch with its tagged purchase. Runs inside the
    /// caller's unit of work.
    pub(super) fn apply_batch_receipt(
        &self,
        product: &Product,
        new: &NewBatch,
    ) -> InventoryResult<ProductBatch> {
        let batch_no = new.batch_no.trim().to_string();
        if batch_no.is_empty() {
            return Err(ValidationError::new("batch_no", "batch number is required").into());
        }
        new.quantity.validate()?;
        for (field, price) in [
            ("purchase_price_per_pack", new.purchase_price_per_pack),
            ("sale_price_per_pack", new.sale_price_per_pack),
        ] {
            if let Some(price) = price {
                if price < Decimal::ZERO {
                    return Err(ValidationError::new(field, "cannot be negative").into());
                }
                ensure_storable(field, price, CURRENCY_DP)?;
            }
        }

        if let Some(distributor_id) = &new.distributor_id {
            if self.db.get_distributor(distributor_id)?.is_none() {
                return Err(InventoryError::not_found("distributor", distributor_id));
            }
        }

        let scheme = product.unit_scheme();
        let initial = scheme.normalize(&new.quantity);
        ensure_quantity_storable(&initial)?;

        let batch = ProductBatch {
            id: new_id(),
            product_id: product.id.clone(),
            distributor_id: new.distributor_id.clone(),
            batch_no: batch_no.clone(),
            expiry_date: new.expiry_date,
            initial,
            current: StockLevel::default(),
            stock_deficit: Decimal::ZERO,
            purchase_price_per_pack: new.purchase_price_per_pack.map(round_currency),
            sale_price_per_pack: new.sale_price_per_pack.map(round_currency),
            is_active: false,
            received_seq: self.db.next_batch_seq()?,
            created_at: now_timestamp(),
        };
        self.db.insert_batch(&batch)?;

        let entry = LedgerEntry::new(&product.id, TransactionType::Purchase, initial)
            .with_batch(Some(&batch.id))
            .with_prices(
                batch.effective_purchase_price(product.net_price()),
                batch
                    .effective_sale_price(product.sale_price())
                    .unwrap_or(Decimal::ZERO),
            )
            .with_notes(Some(format!("Batch {} received", batch.batch_no)));
        self.db.append_ledger_entry(&entry)?;

        self.refresh_batch(&batch, scheme.as_ref(), DeficitPolicy::Reject)?;
        self.refresh_product(product, DeficitPolicy::Reject)?;

        info!(
            batch_id = %batch.id,
            batch_no = %batch.batch_no,
            product_id = %product.id,
            expiry = ?batch.expiry_date,
            quantity = %scheme.base_units(&initial),
            "Received batch"
        );
        self.db
            .get_batch(&batch.id)?
            .ok_or_else(|| InventoryError::not_found("batch", &batch.id))
    }

    /// Earliest-expiry active batch of a product.
    ///
    /// Returns the head of the FEFO order without checking that it can cover
    /// `quantity`; the sale itself performs that check.
    pub fn select_batch_for_sale(
        &self,
        product_id: &str,
        quantity: Quantities,
    ) -> InventoryResult<String> {
        quantity.validate()?;
        self.require_product(product_id)?;
        self.list_batches(product_id)?
            .into_iter()
            .next()
            .map(|batch| batch.id)
            .ok_or_else(|| InventoryError::NoStock(product_id.to_string()))
    }

    /// Sellable batches of a product in FEFO order.
    pub fn list_batches(&self, product_id: &str) -> InventoryResult<Vec<ProductBatch>> {
        Ok(fefo_order(self.db.list_batches_for_product(product_id)?))
    }

    /// Every batch of a product in receipt order, including exhausted ones.
    pub fn list_all_batches(&self, product_id: &str) -> InventoryResult<Vec<ProductBatch>> {
        Ok(self.db.list_batches_for_product(product_id)?)
    }
}
