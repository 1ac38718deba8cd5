//! Inventory service: catalog, ledger appends, batches and stock queries.
//!
//! Every mutating call is one unit of work: validation, stock check, ledger
//! append and cache recompute commit together or not at all.

mod batches;
mod movements;
mod recompute;

pub use recompute::RecomputeReport;

pub(crate) use movements::Movement;
pub(crate) use recompute::DeficitPolicy;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::models::{
    new_id, now_timestamp, ConversionFactors, LedgerEntry, NewBatch, NewProduct, Product,
    ProductCategory, Quantities, StockLevel, TransactionType, ValidationError,
};
use crate::pricing::{ensure_storable, PricingCalculator, UNIT_DP};

/// Inventory errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Insufficient stock for {product_id}: requested {requested} {unit}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: Decimal,
        available: Decimal,
        unit: &'static str,
    },

    #[error("No active batch with stock for product {0}")]
    NoStock(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Stock of {product_id} would fall {deficit} {unit} below zero without an oversell override")]
    Consistency {
        product_id: String,
        deficit: Decimal,
        unit: &'static str,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Batch number given to the opening stock of a batch-tracked product.
pub const OPENING_BATCH_NO: &str = "OPENING";

impl InventoryError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        InventoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Cached stock of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStock {
    pub product_id: String,
    pub level: StockLevel,
    /// Base units sold beyond zero under an oversell override
    pub deficit: Decimal,
    /// `subitems` for discrete forms, `items` for bulk forms
    pub base_unit: &'static str,
}

/// Cached stock of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStock {
    pub batch_id: String,
    pub product_id: String,
    pub level: StockLevel,
    pub deficit: Decimal,
    pub is_active: bool,
}

/// Inventory service over one database.
pub struct Inventory<'a> {
    db: &'a Database,
    strict_consistency: bool,
}

impl<'a> Inventory<'a> {
    /// Create a service that rejects unexplained negative stock.
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            strict_consistency: true,
        }
    }

    /// With `false`, unexplained deficits are recorded and logged instead of
    /// rolling the operation back.
    pub fn with_strict_consistency(mut self, strict: bool) -> Self {
        self.strict_consistency = strict;
        self
    }

    pub(crate) fn db(&self) -> &'a Database {
        self.db
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub fn create_category(&self, name: &str) -> InventoryResult<ProductCategory> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "category name is required").into());
        }
        self.db.atomic(|db| {
            if db.find_category_by_name(name)?.is_some() {
                return Err(ValidationError::new("name", format!("category {} already exists", name)).into());
            }
            let category = db.insert_category(name)?;
            info!(category_id = category.id, name = %category.name, "Created category");
            Ok(category)
        })
    }

    pub fn list_categories(&self) -> InventoryResult<Vec<ProductCategory>> {
        Ok(self.db.list_categories()?)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Add a product with no stock and no ledger entry.
    pub fn create_product_catalog_only(&self, new: NewProduct) -> InventoryResult<Product> {
        self.db.atomic(|db| {
            let product = self.build_product(new)?;
            db.insert_product(&product)?;
            info!(product_id = %product.id, name = %product.name, "Created catalog product");
            Ok(product)
        })
    }

    /// Add a product together with its opening purchase of `initial_boxes`
    /// packs, recorded at the net purchase price.
    ///
    /// Batch-tracked products receive the opening stock as an undated
    /// `OPENING` batch so that it stays sellable through FEFO.
    pub fn create_product_with_initial_stock(
        &self,
        new: NewProduct,
        initial_boxes: Decimal,
    ) -> InventoryResult<Product> {
        if initial_boxes <= Decimal::ZERO {
            return Err(ValidationError::new(
                "initial_boxes",
                "opening stock must be greater than zero",
            )
            .into());
        }
        Quantities::boxes(initial_boxes).validate()?;

        self.db.atomic(|db| {
            let product = self.build_product(new)?;
            db.insert_product(&product)?;

            if product.track_batches {
                let opening = NewBatch::new(
                    product.id.clone(),
                    OPENING_BATCH_NO.into(),
                    Quantities::boxes(initial_boxes),
                );
                let batch = self.apply_batch_receipt(&product, &opening)?;
                info!(
                    product_id = %product.id,
                    batch_id = %batch.id,
                    boxes = %initial_boxes,
                    "Created batch-tracked product with opening stock"
                );
                return self.require_product(&product.id);
            }

            let scheme = product.unit_scheme();
            let quantity = scheme.normalize(&Quantities::boxes(initial_boxes));
            ensure_quantity_storable(&quantity)?;
            let entry = LedgerEntry::new(&product.id, TransactionType::Purchase, quantity)
                .with_prices(
                    product.net_price(),
                    product.sale_price().unwrap_or(Decimal::ZERO),
                )
                .with_notes(Some("Opening stock".into()));
            db.append_ledger_entry(&entry)?;
            self.refresh_product(&product, DeficitPolicy::Reject)?;

            info!(
                product_id = %product.id,
                name = %product.name,
                boxes = %initial_boxes,
                "Created product with opening stock"
            );
            self.require_product(&product.id)
        })
    }

    fn build_product(&self, new: NewProduct) -> InventoryResult<Product> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("name", "product name is required").into());
        }
        let factors = ConversionFactors::new(
            new.factors.products_in_box,
            new.factors.items_per_product,
            new.factors.subitems_per_item,
        )?;
        if let Some(category_id) = new.category_id {
            if self.db.get_category(category_id)?.is_none() {
                return Err(InventoryError::not_found("category", &category_id.to_string()));
            }
        }
        let pricing = PricingCalculator::new(factors).calculate(&new.pricing)?;
        let now = now_timestamp();

        Ok(Product {
            id: new_id(),
            name,
            category_id: new.category_id,
            strength: new.strength,
            rack_no: new.rack_no,
            medicine_form: new.medicine_form,
            factors,
            track_batches: new.track_batches,
            pricing,
            stock: StockLevel::default(),
            stock_deficit: Decimal::ZERO,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_product(&self, id: &str) -> InventoryResult<Option<Product>> {
        Ok(self.db.get_product(id)?)
    }

    pub fn list_products(&self) -> InventoryResult<Vec<Product>> {
        Ok(self.db.list_products()?)
    }

    pub(crate) fn require_product(&self, id: &str) -> InventoryResult<Product> {
        self.db
            .get_product(id)?
            .ok_or_else(|| InventoryError::not_found("product", id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Cached stock of a product. Reads the cache only; see [`Self::recompute_product`].
    pub fn get_stock(&self, product_id: &str) -> InventoryResult<ProductStock> {
        let product = self.require_product(product_id)?;
        Ok(ProductStock {
            base_unit: product.unit_scheme().base_unit(),
            product_id: product.id,
            level: product.stock,
            deficit: product.stock_deficit,
        })
    }

    pub fn get_batch_stock(&self, batch_id: &str) -> InventoryResult<BatchStock> {
        let batch = self
            .db
            .get_batch(batch_id)?
            .ok_or_else(|| InventoryError::not_found("batch", batch_id))?;
        Ok(BatchStock {
            batch_id: batch.id,
            product_id: batch.product_id,
            level: batch.current,
            deficit: batch.stock_deficit,
            is_active: batch.is_active,
        })
    }

    /// Latest ledger entries of a product, newest first.
    pub fn list_transactions(&self, product_id: &str, limit: usize) -> InventoryResult<Vec<LedgerEntry>> {
        self.require_product(product_id)?;
        Ok(self.db.recent_ledger_entries(product_id, limit)?)
    }
}

/// Reject normalized quantities that do not fit the storage columns.
pub(crate) fn ensure_quantity_storable(quantity: &Quantities) -> Result<(), ValidationError> {
    ensure_storable("quantity", quantity.boxes, UNIT_DP)?;
    ensure_storable("quantity", quantity.items, UNIT_DP)?;
    ensure_storable("quantity", quantity.subitems, UNIT_DP)
}
