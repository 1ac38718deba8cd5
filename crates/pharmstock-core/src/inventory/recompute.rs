//! Cache recompute from the ledger.
//!
//! Recompute replays every entry of a product (or every batch-tagged entry of
//! a batch) and overwrites only the cached stock columns. It never appends to
//! the ledger.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::{Inventory, InventoryError, InventoryResult};
use crate::models::{now_timestamp, Product, ProductBatch, StockLevel};
use crate::stock::{aggregate, StockComputation, UnitScheme};

/// How a recompute treats a deficit that grew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeficitPolicy {
    /// No override was given: a grown deficit is a consistency failure.
    Reject,
    /// The caller explicitly allowed overselling.
    AllowOversell,
    /// Repair pass: store whatever the ledger says.
    Record,
}

/// Outcome of recomputing one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeReport {
    pub product_id: String,
    pub previous: StockLevel,
    pub current: StockLevel,
    pub deficit: Decimal,
    /// Batches of the product that were recomputed
    pub batches: usize,
}

impl RecomputeReport {
    /// Whether the cache disagreed with the ledger.
    pub fn drifted(&self) -> bool {
        self.previous != self.current
    }
}

impl<'a> Inventory<'a> {
    /// Replay the ledger into a product's cached stock.
    pub(crate) fn refresh_product(
        &self,
        product: &Product,
        policy: DeficitPolicy,
    ) -> InventoryResult<StockComputation> {
        let scheme = product.unit_scheme();
        let entries = self.db.ledger_entries_for_product(&product.id)?;
        let computed = aggregate(scheme.as_ref(), &entries);

        self.check_deficit(
            &product.id,
            scheme.as_ref(),
            product.stock_deficit,
            &computed,
            policy,
        )?;

        self.db.update_product_stock(
            &product.id,
            &computed.level,
            computed.deficit,
            &now_timestamp(),
        )?;
        debug!(
            product_id = %product.id,
            entries = entries.len(),
            subitems = %computed.level.subitems,
            items = %computed.level.items,
            boxes = %computed.level.boxes,
            "Recomputed product stock"
        );
        Ok(computed)
    }

    /// Replay batch-tagged entries into a batch's cached stock.
    pub(crate) fn refresh_batch(
        &self,
        batch: &ProductBatch,
        scheme: &dyn UnitScheme,
        policy: DeficitPolicy,
    ) -> InventoryResult<StockComputation> {
        let entries = self.db.ledger_entries_for_batch(&batch.id)?;
        let computed = aggregate(scheme, &entries);

        self.check_deficit(
            &batch.product_id,
            scheme,
            batch.stock_deficit,
            &computed,
            policy,
        )?;

        let is_active = computed.level.subitems > Decimal::ZERO;
        self.db
            .update_batch_stock(&batch.id, &computed.level, computed.deficit, is_active)?;

        let initial = scheme.base_units(&batch.initial);
        if computed.net > initial {
            warn!(
                batch_id = %batch.id,
                batch_no = %batch.batch_no,
                current = %computed.net,
                initial = %initial,
                "Batch holds more than it was received with"
            );
        }
        if batch.is_active && !is_active {
            info!(batch_id = %batch.id, batch_no = %batch.batch_no, "Batch exhausted");
        }
        debug!(batch_id = %batch.id, current = %computed.level.subitems, "Recomputed batch stock");
        Ok(computed)
    }

    fn check_deficit(
        &self,
        product_id: &str,
        scheme: &dyn UnitScheme,
        previous_deficit: Decimal,
        computed: &StockComputation,
        policy: DeficitPolicy,
    ) -> InventoryResult<()> {
        if !computed.has_deficit() {
            return Ok(());
        }
        if computed.deficit <= previous_deficit {
            debug!(product_id, deficit = %computed.deficit, "Deficit carried from earlier oversell");
            return Ok(());
        }

        match policy {
            DeficitPolicy::Reject if self.strict_consistency => {
                warn!(
                    product_id,
                    deficit = %computed.deficit,
                    unit = scheme.base_unit(),
                    "Rejected movement leaving unexplained negative stock"
                );
                Err(InventoryError::Consistency {
                    product_id: product_id.to_string(),
                    deficit: computed.deficit,
                    unit: scheme.base_unit(),
                })
            }
            DeficitPolicy::AllowOversell => {
                warn!(
                    product_id,
                    deficit = %computed.deficit,
                    unit = scheme.base_unit(),
                    "Oversold with override"
                );
                Ok(())
            }
            _ => {
                warn!(
                    product_id,
                    deficit = %computed.deficit,
                    unit = scheme.base_unit(),
                    "Negative stock recorded"
                );
                Ok(())
            }
        }
    }

    /// Recompute one product and its batches from the ledger.
    pub fn recompute_product(&self, product_id: &str) -> InventoryResult<RecomputeReport> {
        self.db
            .atomic(|_| self.recompute_product_inner(product_id))
    }

    /// Recompute every product and batch from the ledger, repairing any
    /// drifted cache.
    pub fn recompute_all(&self) -> InventoryResult<Vec<RecomputeReport>> {
        self.db.atomic(|db| {
            let mut reports = Vec::new();
            for product in db.list_products()? {
                reports.push(self.recompute_product_inner(&product.id)?);
            }
            let drifted = reports.iter().filter(|r| r.drifted()).count();
            info!(products = reports.len(), drifted, "Recomputed all stock");
            Ok(reports)
        })
    }

    fn recompute_product_inner(&self, product_id: &str) -> InventoryResult<RecomputeReport> {
        let product = self.require_product(product_id)?;
        let scheme = product.unit_scheme();

        let batches = self.db.list_batches_for_product(product_id)?;
        for batch in &batches {
            self.refresh_batch(batch, scheme.as_ref(), DeficitPolicy::Record)?;
        }
        let computed = self.refresh_product(&product, DeficitPolicy::Record)?;

        Ok(RecomputeReport {
            product_id: product.id,
            previous: product.stock,
            current: computed.level,
            deficit: computed.deficit,
            batches: batches.len(),
        })
    }
}
