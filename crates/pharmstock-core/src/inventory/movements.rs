//! Ledger appends: purchases, sales, returns and stock adjustments.

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{ensure_quantity_storable, DeficitPolicy, Inventory, InventoryError, InventoryResult};
use crate::models::{LedgerEntry, Product, ProductBatch, Quantities, TransactionType, ValidationError};
use crate::pricing::{ensure_storable, UNIT_DP};
use crate::stock::fefo_order;

/// One requested stock movement.
#[derive(Debug, Clone)]
pub(crate) struct Movement<'m> {
    pub product_id: &'m str,
    pub txn_type: TransactionType,
    /// Composite caller quantity, normalized before the append
    pub quantity: Quantities,
    /// Price of one pack; purchase side for PUR/IN/OUT, sale side for SALE/RET
    pub unit_price: Option<Decimal>,
    pub batch_id: Option<&'m str>,
    pub allow_oversell: bool,
    pub notes: Option<String>,
}

impl<'m> Movement<'m> {
    pub(crate) fn new(product_id: &'m str, txn_type: TransactionType, quantity: Quantities) -> Self {
        Self {
            product_id,
            txn_type,
            quantity,
            unit_price: None,
            batch_id: None,
            allow_oversell: false,
            notes: None,
        }
    }
}

/// A movement after it has been appended and the caches recomputed.
#[derive(Debug, Clone)]
pub(crate) struct AppliedMovement {
    pub product: Product,
    pub entry: LedgerEntry,
}

impl<'a> Inventory<'a> {
    /// Record stock bought from a distributor. `unit_price` is the purchase
    /// price of one pack.
    pub fn record_purchase(
        &self,
        product_id: &str,
        quantity: Quantities,
        unit_price: Decimal,
        batch_id: Option<&str>,
    ) -> InventoryResult<String> {
        let mut movement = Movement::new(product_id, TransactionType::Purchase, quantity);
        movement.unit_price = Some(unit_price);
        movement.batch_id = batch_id;
        self.record(movement)
    }

    /// Record a sale. Without `allow_oversell`, selling more than the product
    /// (or the selected batch) holds fails with `InsufficientStock`.
    ///
    /// `unit_price` defaults to the batch sale price, then the product's.
    pub fn record_sale(
        &self,
        product_id: &str,
        quantity: Quantities,
        unit_price: Option<Decimal>,
        batch_id: Option<&str>,
        allow_oversell: bool,
    ) -> InventoryResult<String> {
        let mut movement = Movement::new(product_id, TransactionType::Sale, quantity);
        movement.unit_price = unit_price;
        movement.batch_id = batch_id;
        movement.allow_oversell = allow_oversell;
        self.record(movement)
    }

    /// Record stock a customer brought back.
    pub fn record_return(
        &self,
        product_id: &str,
        quantity: Quantities,
        unit_sale_price: Option<Decimal>,
        batch_id: Option<&str>,
    ) -> InventoryResult<String> {
        let mut movement = Movement::new(product_id, TransactionType::Return, quantity);
        movement.unit_price = unit_sale_price;
        movement.batch_id = batch_id;
        self.record(movement)
    }

    /// Record non-commercial stock added (found, transferred in).
    pub fn record_incoming(
        &self,
        product_id: &str,
        quantity: Quantities,
        batch_id: Option<&str>,
        notes: Option<String>,
    ) -> InventoryResult<String> {
        let mut movement = Movement::new(product_id, TransactionType::Incoming, quantity);
        movement.batch_id = batch_id;
        movement.notes = notes;
        self.record(movement)
    }

    /// Record non-commercial stock removed (damaged, expired, transferred out).
    pub fn record_outgoing(
        &self,
        product_id: &str,
        quantity: Quantities,
        batch_id: Option<&str>,
        notes: Option<String>,
    ) -> InventoryResult<String> {
        let mut movement = Movement::new(product_id, TransactionType::Outgoing, quantity);
        movement.batch_id = batch_id;
        movement.notes = notes;
        self.record(movement)
    }

    fn record(&self, movement: Movement<'_>) -> InventoryResult<String> {
        let applied = self.db.atomic(|_| self.apply_movement(&movement))?;
        Ok(applied.entry.id)
    }

    /// Validate, check stock, append and recompute. Runs inside the caller's
    /// unit of work.
    pub(crate) fn apply_movement(&self, movement: &Movement<'_>) -> InventoryResult<AppliedMovement> {
        let product = self.require_product(movement.product_id)?;
        movement.quantity.validate()?;
        if let Some(price) = movement.unit_price {
            if price < Decimal::ZERO {
                return Err(ValidationError::new("unit_price", "cannot be negative").into());
            }
            ensure_storable("unit_price", price, UNIT_DP)?;
        }

        let scheme = product.unit_scheme();
        let quantity = scheme.normalize(&movement.quantity);
        ensure_quantity_storable(&quantity)?;

        let batch = self.resolve_batch(&product, movement)?;

        if movement.txn_type.is_outgoing() {
            // Subitems hold the base count for both unit schemes.
            let available = batch
                .as_ref()
                .map(|b| b.current.subitems)
                .unwrap_or(product.stock.subitems);
            if let Err(shortfall) = scheme.consume_for_sale(available, &movement.quantity) {
                if !movement.allow_oversell {
                    return Err(InventoryError::InsufficientStock {
                        product_id: product.id.clone(),
                        requested: shortfall.requested,
                        available: shortfall.available,
                        unit: scheme.base_unit(),
                    });
                }
                warn!(
                    product_id = %product.id,
                    batch_id = ?batch.as_ref().map(|b| b.id.as_str()),
                    requested = %shortfall.requested,
                    available = %shortfall.available,
                    "Overselling with override"
                );
            }
        }

        let (unit_purchase_price, unit_sale_price) =
            self.movement_prices(&product, batch.as_ref(), movement)?;

        let entry = LedgerEntry::new(&product.id, movement.txn_type, quantity)
            .with_batch(batch.as_ref().map(|b| b.id.as_str()))
            .with_prices(unit_purchase_price, unit_sale_price)
            .with_notes(movement.notes.clone());
        self.db.append_ledger_entry(&entry)?;

        let policy = if movement.allow_oversell {
            DeficitPolicy::AllowOversell
        } else {
            DeficitPolicy::Reject
        };
        if let Some(batch) = &batch {
            self.refresh_batch(batch, scheme.as_ref(), policy)?;
        }
        self.refresh_product(&product, policy)?;

        info!(
            transaction_id = %entry.id,
            product_id = %product.id,
            batch_id = ?entry.batch_id,
            txn_type = entry.txn_type.as_str(),
            quantity = %scheme.base_units(&quantity),
            unit = scheme.base_unit(),
            "Recorded ledger entry"
        );

        Ok(AppliedMovement { product, entry })
    }

    /// The named batch, or for outgoing movements of batch-tracked products
    /// the earliest FEFO batch. Incoming stock of a batch-tracked product must
    /// name its batch.
    fn resolve_batch(
        &self,
        product: &Product,
        movement: &Movement<'_>,
    ) -> InventoryResult<Option<ProductBatch>> {
        if let Some(batch_id) = movement.batch_id {
            let batch = self
                .db
                .get_batch(batch_id)?
                .ok_or_else(|| InventoryError::not_found("batch", batch_id))?;
            if batch.product_id != product.id {
                return Err(ValidationError::new(
                    "batch_id",
                    format!("batch {} belongs to another product", batch_id),
                )
                .into());
            }
            return Ok(Some(batch));
        }

        if !product.track_batches {
            return Ok(None);
        }
        if !movement.txn_type.is_outgoing() {
            // Untagged stock would never be reachable through FEFO.
            return Err(ValidationError::new(
                "batch_id",
                format!(
                    "{} tracks batches; receive stock with receive_batch or name a batch",
                    product.name
                ),
            )
            .into());
        }
        let first = fefo_order(self.db.list_batches_for_product(&product.id)?)
            .into_iter()
            .next();
        match first {
            Some(batch) => Ok(Some(batch)),
            None if movement.allow_oversell => Ok(None),
            None => Err(InventoryError::NoStock(product.id.clone())),
        }
    }

    fn movement_prices(
        &self,
        product: &Product,
        batch: Option<&ProductBatch>,
        movement: &Movement<'_>,
    ) -> InventoryResult<(Decimal, Decimal)> {
        let purchase_price = batch
            .map(|b| b.effective_purchase_price(product.net_price()))
            .unwrap_or_else(|| product.net_price());
        let sale_price = match batch {
            Some(b) => b.effective_sale_price(product.sale_price()),
            None => product.sale_price(),
        };

        match movement.txn_type {
            TransactionType::Sale | TransactionType::Return => {
                let unit_sale = movement.unit_price.or(sale_price).ok_or_else(|| {
                    ValidationError::new(
                        "unit_price",
                        format!("no sale price configured for {}", product.name),
                    )
                })?;
                Ok((purchase_price, unit_sale))
            }
            TransactionType::Purchase | TransactionType::Incoming | TransactionType::Outgoing => Ok((
                movement.unit_price.unwrap_or(purchase_price),
                sale_price.unwrap_or(Decimal::ZERO),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ConversionFactors, MedicineForm, NewProduct};
    use crate::pricing::Discount;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn panadol(inventory: &Inventory<'_>) -> Product {
        inventory
            .create_product_catalog_only(
                NewProduct::new(
                    "Panadol".into(),
                    MedicineForm::Tablet,
                    ConversionFactors::new(1, 10, 10).unwrap(),
                    dec(400),
                )
                .with_discount(Discount::Percent(Decimal::TEN))
                .with_sale_price(dec(450)),
            )
            .unwrap()
    }

    fn cough_syrup(inventory: &Inventory<'_>) -> Product {
        inventory
            .create_product_catalog_only(NewProduct::new(
                "Cough Syrup 120mL".into(),
                MedicineForm::Syrup,
                ConversionFactors::new(1, 12, 1).unwrap(),
                dec(1200),
            ))
            .unwrap()
    }

    #[test]
    fn test_purchase_then_sell_tablets() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);

        inventory
            .record_purchase(&product.id, Quantities::boxes(1), dec(360), None)
            .unwrap();
        let stock = inventory.get_stock(&product.id).unwrap().level;
        assert_eq!((stock.subitems, stock.items, stock.boxes), (dec(100), dec(10), dec(1)));

        let txn = inventory
            .record_sale(&product.id, Quantities::subitems(35), None, None, false)
            .unwrap();
        let stock = inventory.get_stock(&product.id).unwrap().level;
        assert_eq!((stock.subitems, stock.items, stock.boxes), (dec(65), dec(6), dec(0)));

        let entry = db.get_ledger_entry(&txn).unwrap().unwrap();
        assert_eq!(entry.unit_sale_price, dec(450));
        assert_eq!(entry.unit_purchase_price, dec(360));
        assert_eq!(entry.outgoing.subitems, dec(35));
        assert!(entry.incoming.is_zero());
    }

    #[test]
    fn test_composite_quantity() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);

        inventory
            .record_purchase(
                &product.id,
                Quantities::new(dec(1), dec(2), dec(3)),
                dec(360),
                None,
            )
            .unwrap();
        let stock = inventory.get_stock(&product.id).unwrap().level;
        assert_eq!(stock.subitems, dec(123));
        assert_eq!(stock.items, dec(12));
        assert_eq!(stock.boxes, dec(1));
    }

    #[test]
    fn test_oversell_requires_override() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);
        inventory
            .record_purchase(&product.id, Quantities::subitems(10), dec(360), None)
            .unwrap();

        let err = inventory
            .record_sale(&product.id, Quantities::subitems(15), None, None, false)
            .unwrap_err();
        match err {
            InventoryError::InsufficientStock {
                requested,
                available,
                unit,
                ..
            } => {
                assert_eq!(requested, dec(15));
                assert_eq!(available, dec(10));
                assert_eq!(unit, "subitems");
            }
            other => panic!("unexpected error {other:?}"),
        }
        // Nothing was written
        assert_eq!(inventory.list_transactions(&product.id, 10).unwrap().len(), 1);

        inventory
            .record_sale(&product.id, Quantities::subitems(15), None, None, true)
            .unwrap();
        let stock = inventory.get_stock(&product.id).unwrap();
        assert_eq!(stock.level.subitems, Decimal::ZERO);
        assert_eq!(stock.deficit, dec(5));
    }

    #[test]
    fn test_purchase_after_oversell_is_not_a_consistency_error() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);
        inventory
            .record_sale(&product.id, Quantities::subitems(20), None, None, true)
            .unwrap();

        // Deficit shrinks from 20 to 10: explained by the earlier override
        inventory
            .record_purchase(&product.id, Quantities::subitems(10), dec(360), None)
            .unwrap();
        assert_eq!(inventory.get_stock(&product.id).unwrap().deficit, dec(10));

        inventory
            .record_purchase(&product.id, Quantities::items(3), dec(360), None)
            .unwrap();
        let stock = inventory.get_stock(&product.id).unwrap();
        assert_eq!(stock.deficit, Decimal::ZERO);
        assert_eq!(stock.level.subitems, dec(20));
    }

    #[test]
    fn test_return_restores_stock() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);
        inventory
            .record_purchase(&product.id, Quantities::boxes(1), dec(360), None)
            .unwrap();
        inventory
            .record_sale(&product.id, Quantities::items(2), None, None, false)
            .unwrap();
        inventory
            .record_return(&product.id, Quantities::subitems(5), None, None)
            .unwrap();

        assert_eq!(inventory.get_stock(&product.id).unwrap().level.subitems, dec(85));
    }

    #[test]
    fn test_adjustments() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);

        inventory
            .record_incoming(&product.id, Quantities::items(5), None, Some("transfer in".into()))
            .unwrap();
        inventory
            .record_outgoing(&product.id, Quantities::subitems(7), None, Some("damaged".into()))
            .unwrap();
        assert_eq!(inventory.get_stock(&product.id).unwrap().level.subitems, dec(43));

        let err = inventory
            .record_outgoing(&product.id, Quantities::items(5), None, None)
            .unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));

        let history = inventory.list_transactions(&product.id, 1).unwrap();
        assert_eq!(history[0].txn_type, TransactionType::Outgoing);
        assert_eq!(history[0].notes.as_deref(), Some("damaged"));
    }

    #[test]
    fn test_bulk_counts_containers() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = cough_syrup(&inventory);

        inventory
            .record_purchase(&product.id, Quantities::boxes(2), dec(1200), None)
            .unwrap();
        inventory
            .record_sale(&product.id, Quantities::items(5), Some(dec(120)), None, false)
            .unwrap();

        let stock = inventory.get_stock(&product.id).unwrap();
        assert_eq!(stock.base_unit, "items");
        assert_eq!(stock.level.items, dec(19));
        assert_eq!(stock.level.subitems, dec(19));
        assert_eq!(stock.level.boxes, Decimal::ZERO);
    }

    #[test]
    fn test_sale_without_any_price_rejected() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = cough_syrup(&inventory);
        inventory
            .record_purchase(&product.id, Quantities::items(3), dec(1200), None)
            .unwrap();

        let err = inventory
            .record_sale(&product.id, Quantities::items(1), None, None, false)
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(ref v) if v.field == "unit_price"));
    }

    #[test]
    fn test_invalid_quantities() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        let product = panadol(&inventory);

        for quantity in [Quantities::zero(), Quantities::subitems(-1)] {
            let err = inventory
                .record_purchase(&product.id, quantity, dec(360), None)
                .unwrap_err();
            assert!(matches!(err, InventoryError::Validation(_)));
        }
        let err = inventory
            .record_purchase(&product.id, Quantities::boxes(1), dec(-1), None)
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
        assert!(matches!(
            inventory.record_purchase("ghost", Quantities::boxes(1), dec(1), None),
            Err(InventoryError::NotFound { .. })
        ));
    }
}
