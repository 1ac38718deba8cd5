//! Pharmstock Core Library
//!
//! Local-first pharmacy inventory engine: unit conversion, pricing, an
//! append-only stock ledger, FEFO batches and distributor payables.
//!
//! # Architecture
//!
//! ```text
//! Purchase / Sale / Return / Adjustment        Checkout / Return desk
//!                 │                                      │
//!                 └──────────────┬───────────────────────┘
//!                                │
//!                    UnitScheme.normalize (box/item/subitem)
//!                                │
//!              ┌─────────────────▼─────────────────┐
//!              │   BEGIN IMMEDIATE (write lock)    │
//!              │   stock check → ledger append     │
//!              │   → batch recompute               │
//!              │   → product recompute             │
//!              │   COMMIT (or roll back on error)  │
//!              └─────────────────┬─────────────────┘
//!                                │
//!             ┌──────────────────┼──────────────────┐
//!             │                  │                  │
//!             ▼                  ▼                  ▼
//!        Cached stock       FEFO batches       Period reports
//! ```
//!
//! # Core Principle
//!
//! **The ledger is the truth.** Cached totals on products and batches are
//! always a replay of immutable ledger rows, never an increment.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with an immutable ledger
//! - [`models`]: Domain types (Product, LedgerEntry, ProductBatch, etc.)
//! - [`pricing`]: Net, per-unit and sale price derivation
//! - [`stock`]: Unit schemes, ledger replay and FEFO ordering
//! - [`inventory`]: Catalog, movements, batches and recompute
//! - [`checkout`]: Bills and customer returns
//! - [`distributors`]: Supplier payables
//! - [`reports`]: Period, monthly and yearly summaries
//! - [`config`]: Engine configuration and logging setup

pub mod checkout;
pub mod config;
pub mod db;
pub mod distributors;
pub mod inventory;
pub mod models;
pub mod pricing;
pub mod reports;
pub mod stock;

// Re-export commonly used types
pub use crate::config::EngineConfig;
pub use db::Database;
pub use distributors::{DistributorLedger, NewDistributor};
pub use inventory::{
    BatchStock, Inventory, InventoryError, InventoryResult, ProductStock, RecomputeReport,
};
pub use models::{
    CheckoutRequest, ConversionFactors, Distributor, LedgerEntry, MedicineForm, MedicineReturn,
    NewBatch, NewProduct, PharmacySale, Product, ProductBatch, Quantities, ReturnReason,
    ReturnRequest, SaleLineRequest, StockLevel, TransactionType, ValidationError,
};
pub use pricing::{Discount, PriceBreakdown, PricingCalculator, PricingInput};
pub use reports::{PeriodSummary, Reports, YearlyBalance};
pub use stock::{BulkUnitScheme, DiscreteUnitScheme, UnitScheme};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::db::dec_to_sql;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PharmStockError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("No stock: {0}")]
    NoStock(String),

    #[error("Consistency error: {0}")]
    ConsistencyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for PharmStockError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => PharmStockError::NotFound(what),
            other => PharmStockError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ValidationError> for PharmStockError {
    fn from(e: ValidationError) -> Self {
        PharmStockError::InvalidInput(e.to_string())
    }
}

impl From<InventoryError> for PharmStockError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::Validation(v) => v.into(),
            InventoryError::Database(db) => db.into(),
            e @ InventoryError::InsufficientStock { .. } => {
                PharmStockError::InsufficientStock(e.to_string())
            }
            e @ InventoryError::NoStock(_) => PharmStockError::NoStock(e.to_string()),
            e @ InventoryError::NotFound { .. } => PharmStockError::NotFound(e.to_string()),
            e @ InventoryError::Consistency { .. } => {
                PharmStockError::ConsistencyError(e.to_string())
            }
        }
    }
}

impl From<::config::ConfigError> for PharmStockError {
    fn from(e: ::config::ConfigError) -> Self {
        PharmStockError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for PharmStockError {
    fn from(e: serde_json::Error) -> Self {
        PharmStockError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PharmStockError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PharmStockError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, PharmStockError> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| PharmStockError::InvalidInput(format!("{}: {} ({})", field, value, e)))
}

fn parse_opt_decimal(field: &str, value: Option<&str>) -> Result<Option<Decimal>, PharmStockError> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, PharmStockError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| PharmStockError::InvalidInput(format!("{}: {} ({})", field, value, e)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<PharmStockCore>, PharmStockError> {
    let db = Database::open(&path)?;
    Ok(PharmStockCore::wrap(db, true))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<PharmStockCore>, PharmStockError> {
    let db = Database::open_in_memory()?;
    Ok(PharmStockCore::wrap(db, true))
}

/// Open the database named by `pharmstock.toml` / `PHARMSTOCK_*` and
/// install logging.
#[uniffi::export]
pub fn open_database_from_config() -> Result<Arc<PharmStockCore>, PharmStockError> {
    let config = EngineConfig::load()?;
    crate::config::init_tracing(&config.log_filter);
    let db = config.open_database()?;
    Ok(PharmStockCore::wrap(db, config.strict_consistency))
}

/// Derive net, per-unit and sale prices without touching the database.
#[uniffi::export]
pub fn preview_prices(
    items_per_product: u32,
    subitems_per_item: u32,
    pricing: FfiPricingInput,
) -> Result<FfiPriceBreakdown, PharmStockError> {
    let factors = ConversionFactors::new(1, items_per_product, subitems_per_item)?;
    let input = pricing.parse()?;
    let breakdown = PricingCalculator::new(factors).calculate(&input)?;
    Ok(breakdown.into())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PharmStockCore {
    db: Arc<Mutex<Database>>,
    strict_consistency: bool,
}

impl PharmStockCore {
    fn wrap(db: Database, strict_consistency: bool) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            strict_consistency,
        })
    }

    fn inventory<'a>(&self, db: &'a Database) -> Inventory<'a> {
        Inventory::new(db).with_strict_consistency(self.strict_consistency)
    }
}

#[uniffi::export]
impl PharmStockCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    pub fn create_category(&self, name: String) -> Result<FfiCategory, PharmStockError> {
        let db = self.db.lock()?;
        let category = self.inventory(&db).create_category(&name)?;
        Ok(FfiCategory {
            id: category.id,
            name: category.name,
        })
    }

    pub fn list_categories(&self) -> Result<Vec<FfiCategory>, PharmStockError> {
        let db = self.db.lock()?;
        let categories = self.inventory(&db).list_categories()?;
        Ok(categories
            .into_iter()
            .map(|c| FfiCategory { id: c.id, name: c.name })
            .collect())
    }

    /// Add a product without stock.
    pub fn create_product_catalog_only(
        &self,
        product: FfiNewProduct,
    ) -> Result<FfiProduct, PharmStockError> {
        let new = product.parse()?;
        let db = self.db.lock()?;
        let created = self.inventory(&db).create_product_catalog_only(new)?;
        Ok(created.into())
    }

    /// Add a product with an opening purchase of `initial_boxes` packs.
    pub fn create_product_with_initial_stock(
        &self,
        product: FfiNewProduct,
        initial_boxes: String,
    ) -> Result<FfiProduct, PharmStockError> {
        let new = product.parse()?;
        let boxes = parse_decimal("initial_boxes", &initial_boxes)?;
        let db = self.db.lock()?;
        let created = self
            .inventory(&db)
            .create_product_with_initial_stock(new, boxes)?;
        Ok(created.into())
    }

    pub fn get_product(&self, product_id: String) -> Result<Option<FfiProduct>, PharmStockError> {
        let db = self.db.lock()?;
        let product = self.inventory(&db).get_product(&product_id)?;
        Ok(product.map(|p| p.into()))
    }

    pub fn list_products(&self) -> Result<Vec<FfiProduct>, PharmStockError> {
        let db = self.db.lock()?;
        let products = self.inventory(&db).list_products()?;
        Ok(products.into_iter().map(|p| p.into()).collect())
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Record a purchase; returns the transaction ID.
    pub fn record_purchase(
        &self,
        product_id: String,
        quantity: FfiQuantities,
        unit_price: String,
        batch_id: Option<String>,
    ) -> Result<String, PharmStockError> {
        let quantity = quantity.parse()?;
        let unit_price = parse_decimal("unit_price", &unit_price)?;
        let db = self.db.lock()?;
        Ok(self.inventory(&db).record_purchase(
            &product_id,
            quantity,
            unit_price,
            batch_id.as_deref(),
        )?)
    }

    /// Record a sale; fails with `InsufficientStock` unless `allow_oversell`.
    pub fn record_sale(
        &self,
        product_id: String,
        quantity: FfiQuantities,
        unit_price: Option<String>,
        batch_id: Option<String>,
        allow_oversell: bool,
    ) -> Result<String, PharmStockError> {
        let quantity = quantity.parse()?;
        let unit_price = parse_opt_decimal("unit_price", unit_price.as_deref())?;
        let db = self.db.lock()?;
        Ok(self.inventory(&db).record_sale(
            &product_id,
            quantity,
            unit_price,
            batch_id.as_deref(),
            allow_oversell,
        )?)
    }

    pub fn record_return(
        &self,
        product_id: String,
        quantity: FfiQuantities,
        unit_sale_price: Option<String>,
        batch_id: Option<String>,
    ) -> Result<String, PharmStockError> {
        let quantity = quantity.parse()?;
        let unit_sale_price = parse_opt_decimal("unit_sale_price", unit_sale_price.as_deref())?;
        let db = self.db.lock()?;
        Ok(self.inventory(&db).record_return(
            &product_id,
            quantity,
            unit_sale_price,
            batch_id.as_deref(),
        )?)
    }

    pub fn record_incoming(
        &self,
        product_id: String,
        quantity: FfiQuantities,
        batch_id: Option<String>,
        notes: Option<String>,
    ) -> Result<String, PharmStockError> {
        let quantity = quantity.parse()?;
        let db = self.db.lock()?;
        Ok(self
            .inventory(&db)
            .record_incoming(&product_id, quantity, batch_id.as_deref(), notes)?)
    }

    pub fn record_outgoing(
        &self,
        product_id: String,
        quantity: FfiQuantities,
        batch_id: Option<String>,
        notes: Option<String>,
    ) -> Result<String, PharmStockError> {
        let quantity = quantity.parse()?;
        let db = self.db.lock()?;
        Ok(self
            .inventory(&db)
            .record_outgoing(&product_id, quantity, batch_id.as_deref(), notes)?)
    }

    /// Latest ledger entries of a product, newest first.
    pub fn list_transactions(
        &self,
        product_id: String,
        limit: u32,
    ) -> Result<Vec<FfiLedgerEntry>, PharmStockError> {
        let db = self.db.lock()?;
        let entries = self
            .inventory(&db)
            .list_transactions(&product_id, limit as usize)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    // =========================================================================
    // Stock Queries
    // =========================================================================

    pub fn get_stock(&self, product_id: String) -> Result<FfiProductStock, PharmStockError> {
        let db = self.db.lock()?;
        let stock = self.inventory(&db).get_stock(&product_id)?;
        Ok(stock.into())
    }

    pub fn get_batch_stock(&self, batch_id: String) -> Result<FfiBatchStock, PharmStockError> {
        let db = self.db.lock()?;
        let stock = self.inventory(&db).get_batch_stock(&batch_id)?;
        Ok(stock.into())
    }

    /// Replay the ledger of one product and repair its caches.
    pub fn recompute_product(
        &self,
        product_id: String,
    ) -> Result<FfiRecomputeReport, PharmStockError> {
        let db = self.db.lock()?;
        let report = self.inventory(&db).recompute_product(&product_id)?;
        Ok(report.into())
    }

    /// Replay the ledger of every product.
    pub fn recompute_all(&self) -> Result<Vec<FfiRecomputeReport>, PharmStockError> {
        let db = self.db.lock()?;
        let reports = self.inventory(&db).recompute_all()?;
        Ok(reports.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Batch Operations
    // =========================================================================

    pub fn receive_batch(&self, batch: FfiNewBatch) -> Result<FfiBatch, PharmStockError> {
        let new = batch.parse()?;
        let db = self.db.lock()?;
        let received = self.inventory(&db).receive_batch(new)?;
        Ok(received.into())
    }

    /// Earliest-expiry batch with stock.
    pub fn select_batch_for_sale(
        &self,
        product_id: String,
        quantity: FfiQuantities,
    ) -> Result<String, PharmStockError> {
        let quantity = quantity.parse()?;
        let db = self.db.lock()?;
        Ok(self
            .inventory(&db)
            .select_batch_for_sale(&product_id, quantity)?)
    }

    /// Sellable batches in FEFO order.
    pub fn list_batches(&self, product_id: String) -> Result<Vec<FfiBatch>, PharmStockError> {
        let db = self.db.lock()?;
        let batches = self.inventory(&db).list_batches(&product_id)?;
        Ok(batches.into_iter().map(|b| b.into()).collect())
    }

    // =========================================================================
    // Checkout Operations
    // =========================================================================

    pub fn checkout(&self, request: FfiCheckoutRequest) -> Result<FfiSale, PharmStockError> {
        let request = request.parse()?;
        let db = self.db.lock()?;
        let sale = self.inventory(&db).checkout(request)?;
        Ok(sale.into())
    }

    pub fn process_return(&self, request: FfiReturnRequest) -> Result<FfiReturn, PharmStockError> {
        let request = request.parse()?;
        let db = self.db.lock()?;
        let processed = self.inventory(&db).process_return(request)?;
        Ok(processed.into())
    }

    // =========================================================================
    // Distributor Operations
    // =========================================================================

    pub fn create_distributor(
        &self,
        name: String,
        phone: Option<String>,
        address: Option<String>,
    ) -> Result<FfiDistributor, PharmStockError> {
        let db = self.db.lock()?;
        let distributor = DistributorLedger::new(&db).create_distributor(NewDistributor {
            name,
            phone,
            address,
        })?;
        Ok(distributor.into())
    }

    pub fn get_distributor(&self, distributor_id: String) -> Result<FfiDistributor, PharmStockError> {
        let db = self.db.lock()?;
        let distributor = DistributorLedger::new(&db).get_distributor(&distributor_id)?;
        Ok(distributor.into())
    }

    pub fn list_distributors(&self) -> Result<Vec<FfiDistributor>, PharmStockError> {
        let db = self.db.lock()?;
        let distributors = DistributorLedger::new(&db).list_distributors()?;
        Ok(distributors.into_iter().map(|d| d.into()).collect())
    }

    /// Record a purchase invoice; returns the updated balance.
    pub fn record_distributor_purchase(
        &self,
        distributor_id: String,
        amount: String,
        invoice_no: Option<String>,
        purchase_date: String,
        notes: Option<String>,
    ) -> Result<FfiDistributor, PharmStockError> {
        let amount = parse_decimal("amount", &amount)?;
        let date = parse_date("purchase_date", &purchase_date)?;
        let db = self.db.lock()?;
        let distributor = DistributorLedger::new(&db)
            .record_purchase(&distributor_id, amount, invoice_no, date, notes)?;
        Ok(distributor.into())
    }

    /// Record a payment; returns the updated balance.
    pub fn record_distributor_payment(
        &self,
        distributor_id: String,
        amount: String,
        payment_date: String,
        method: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiDistributor, PharmStockError> {
        let amount = parse_decimal("amount", &amount)?;
        let date = parse_date("payment_date", &payment_date)?;
        let db = self.db.lock()?;
        let distributor = DistributorLedger::new(&db)
            .record_payment(&distributor_id, amount, date, method, notes)?;
        Ok(distributor.into())
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Period summary as JSON. Dates are `YYYY-MM-DD`, inclusive.
    pub fn summarize_period_json(&self, from: String, to: String) -> Result<String, PharmStockError> {
        let from = parse_date("from", &from)?;
        let to = parse_date("to", &to)?;
        let db = self.db.lock()?;
        let summary = Reports::new(&db).summarize_period(from, to)?;
        Ok(serde_json::to_string(&summary)?)
    }

    pub fn monthly_sales_json(&self, year: i32, month: u32) -> Result<String, PharmStockError> {
        let db = self.db.lock()?;
        let summary = Reports::new(&db).monthly_sales(year, month)?;
        Ok(serde_json::to_string(&summary)?)
    }

    pub fn yearly_balance_json(&self, year: i32) -> Result<String, PharmStockError> {
        let db = self.db.lock()?;
        let balance = Reports::new(&db).yearly_balance(year)?;
        Ok(serde_json::to_string(&balance)?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe composite quantity. Decimals are strings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQuantities {
    pub boxes: String,
    pub items: String,
    pub subitems: String,
}

impl FfiQuantities {
    fn parse(&self) -> Result<Quantities, PharmStockError> {
        Ok(Quantities::new(
            parse_decimal("boxes", &self.boxes)?,
            parse_decimal("items", &self.items)?,
            parse_decimal("subitems", &self.subitems)?,
        ))
    }
}

impl From<Quantities> for FfiQuantities {
    fn from(q: Quantities) -> Self {
        Self {
            boxes: dec_to_sql(q.boxes),
            items: dec_to_sql(q.items),
            subitems: dec_to_sql(q.subitems),
        }
    }
}

impl From<StockLevel> for FfiQuantities {
    fn from(level: StockLevel) -> Self {
        Self {
            boxes: dec_to_sql(level.boxes),
            items: dec_to_sql(level.items),
            subitems: dec_to_sql(level.subitems),
        }
    }
}

/// FFI-safe category.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCategory {
    pub id: i64,
    pub name: String,
}

/// FFI-safe pricing fields. Zero discount fields mean no discount.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPricingInput {
    pub gross_price: String,
    pub discount_percent: String,
    pub discount_amount: String,
    pub margin_percent: String,
    pub sale_price: Option<String>,
}

impl FfiPricingInput {
    fn parse(&self) -> Result<PricingInput, PharmStockError> {
        let discount = Discount::from_fields(
            parse_decimal("discount_percent", &self.discount_percent)?,
            parse_decimal("discount_amount", &self.discount_amount)?,
        )?;
        Ok(PricingInput {
            gross_price: parse_decimal("gross_price", &self.gross_price)?,
            discount,
            margin_percent: parse_decimal("margin_percent", &self.margin_percent)?,
            sale_price: parse_opt_decimal("sale_price", self.sale_price.as_deref())?,
        })
    }
}

/// FFI-safe derived prices.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPriceBreakdown {
    pub gross_price: String,
    pub discount_percent: String,
    pub discount_amount: String,
    pub net_price: String,
    pub price_per_item: String,
    pub price_per_subitem: String,
    pub margin_percent: String,
    pub sale_price: Option<String>,
    pub sale_price_per_item: Option<String>,
    pub sale_price_per_subitem: Option<String>,
}

impl From<PriceBreakdown> for FfiPriceBreakdown {
    fn from(p: PriceBreakdown) -> Self {
        Self {
            gross_price: dec_to_sql(p.gross_price),
            discount_percent: dec_to_sql(p.discount_percent),
            discount_amount: dec_to_sql(p.discount_amount),
            net_price: dec_to_sql(p.net_price),
            price_per_item: dec_to_sql(p.price_per_item),
            price_per_subitem: dec_to_sql(p.price_per_subitem),
            margin_percent: dec_to_sql(p.margin_percent),
            sale_price: p.sale_price.map(dec_to_sql),
            sale_price_per_item: p.sale_price_per_item.map(dec_to_sql),
            sale_price_per_subitem: p.sale_price_per_subitem.map(dec_to_sql),
        }
    }
}

/// FFI-safe catalog fields for a new product.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewProduct {
    pub name: String,
    pub category_id: Option<i64>,
    pub strength: Option<String>,
    pub rack_no: Option<String>,
    /// `tablet`, `capsule`, `syrup`, ...
    pub medicine_form: String,
    pub products_in_box: u32,
    pub items_per_product: u32,
    pub subitems_per_item: u32,
    pub track_batches: bool,
    pub pricing: FfiPricingInput,
}

impl FfiNewProduct {
    fn parse(&self) -> Result<NewProduct, PharmStockError> {
        let medicine_form = MedicineForm::from_str(&self.medicine_form).ok_or_else(|| {
            PharmStockError::InvalidInput(format!("medicine_form: {}", self.medicine_form))
        })?;
        Ok(NewProduct {
            name: self.name.clone(),
            category_id: self.category_id,
            strength: self.strength.clone(),
            rack_no: self.rack_no.clone(),
            medicine_form,
            factors: ConversionFactors::new(
                self.products_in_box,
                self.items_per_product,
                self.subitems_per_item,
            )?,
            track_batches: self.track_batches,
            pricing: self.pricing.parse()?,
        })
    }
}

/// FFI-safe product.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProduct {
    pub id: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub strength: Option<String>,
    pub rack_no: Option<String>,
    pub medicine_form: String,
    pub products_in_box: u32,
    pub items_per_product: u32,
    pub subitems_per_item: u32,
    pub track_batches: bool,
    pub prices: FfiPriceBreakdown,
    pub stock: FfiQuantities,
    pub stock_deficit: String,
}

impl From<Product> for FfiProduct {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category_id: p.category_id,
            strength: p.strength,
            rack_no: p.rack_no,
            medicine_form: p.medicine_form.as_str().to_string(),
            products_in_box: p.factors.products_in_box,
            items_per_product: p.factors.items_per_product,
            subitems_per_item: p.factors.subitems_per_item,
            track_batches: p.track_batches,
            prices: p.pricing.into(),
            stock: p.stock.into(),
            stock_deficit: dec_to_sql(p.stock_deficit),
        }
    }
}

/// FFI-safe product stock.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProductStock {
    pub product_id: String,
    pub stock: FfiQuantities,
    pub deficit: String,
    pub base_unit: String,
}

impl From<ProductStock> for FfiProductStock {
    fn from(s: ProductStock) -> Self {
        Self {
            product_id: s.product_id,
            stock: s.level.into(),
            deficit: dec_to_sql(s.deficit),
            base_unit: s.base_unit.to_string(),
        }
    }
}

/// FFI-safe batch stock.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatchStock {
    pub batch_id: String,
    pub product_id: String,
    pub stock: FfiQuantities,
    pub deficit: String,
    pub is_active: bool,
}

impl From<BatchStock> for FfiBatchStock {
    fn from(s: BatchStock) -> Self {
        Self {
            batch_id: s.batch_id,
            product_id: s.product_id,
            stock: s.level.into(),
            deficit: dec_to_sql(s.deficit),
            is_active: s.is_active,
        }
    }
}

/// FFI-safe ledger entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLedgerEntry {
    pub id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    /// `PUR`, `SALE`, `RET`, `IN` or `OUT`
    pub txn_type: String,
    pub incoming: FfiQuantities,
    pub outgoing: FfiQuantities,
    pub unit_purchase_price: String,
    pub unit_sale_price: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<LedgerEntry> for FfiLedgerEntry {
    fn from(e: LedgerEntry) -> Self {
        Self {
            id: e.id,
            product_id: e.product_id,
            batch_id: e.batch_id,
            txn_type: e.txn_type.as_str().to_string(),
            incoming: e.incoming.into(),
            outgoing: e.outgoing.into(),
            unit_purchase_price: dec_to_sql(e.unit_purchase_price),
            unit_sale_price: dec_to_sql(e.unit_sale_price),
            notes: e.notes,
            created_at: e.created_at,
        }
    }
}

/// FFI-safe recompute outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecomputeReport {
    pub product_id: String,
    pub drifted: bool,
    pub stock: FfiQuantities,
    pub deficit: String,
    pub batches: u32,
}

impl From<RecomputeReport> for FfiRecomputeReport {
    fn from(r: RecomputeReport) -> Self {
        Self {
            drifted: r.drifted(),
            product_id: r.product_id,
            stock: r.current.into(),
            deficit: dec_to_sql(r.deficit),
            batches: r.batches as u32,
        }
    }
}

/// FFI-safe batch receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewBatch {
    pub product_id: String,
    pub distributor_id: Option<String>,
    pub batch_no: String,
    /// `YYYY-MM-DD`
    pub expiry_date: Option<String>,
    pub quantity: FfiQuantities,
    pub purchase_price_per_pack: Option<String>,
    pub sale_price_per_pack: Option<String>,
}

impl FfiNewBatch {
    fn parse(&self) -> Result<NewBatch, PharmStockError> {
        Ok(NewBatch {
            product_id: self.product_id.clone(),
            distributor_id: self.distributor_id.clone(),
            batch_no: self.batch_no.clone(),
            expiry_date: self
                .expiry_date
                .as_deref()
                .map(|d| parse_date("expiry_date", d))
                .transpose()?,
            quantity: self.quantity.parse()?,
            purchase_price_per_pack: parse_opt_decimal(
                "purchase_price_per_pack",
                self.purchase_price_per_pack.as_deref(),
            )?,
            sale_price_per_pack: parse_opt_decimal(
                "sale_price_per_pack",
                self.sale_price_per_pack.as_deref(),
            )?,
        })
    }
}

/// FFI-safe batch.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatch {
    pub id: String,
    pub product_id: String,
    pub distributor_id: Option<String>,
    pub batch_no: String,
    pub expiry_date: Option<String>,
    pub initial: FfiQuantities,
    pub current: FfiQuantities,
    pub stock_deficit: String,
    pub purchase_price_per_pack: Option<String>,
    pub sale_price_per_pack: Option<String>,
    pub is_active: bool,
}

impl From<ProductBatch> for FfiBatch {
    fn from(b: ProductBatch) -> Self {
        Self {
            id: b.id,
            product_id: b.product_id,
            distributor_id: b.distributor_id,
            batch_no: b.batch_no,
            expiry_date: b.expiry_date.map(|d| d.format("%Y-%m-%d").to_string()),
            initial: b.initial.into(),
            current: b.current.into(),
            stock_deficit: dec_to_sql(b.stock_deficit),
            purchase_price_per_pack: b.purchase_price_per_pack.map(dec_to_sql),
            sale_price_per_pack: b.sale_price_per_pack.map(dec_to_sql),
            is_active: b.is_active,
        }
    }
}

/// FFI-safe requested bill or return line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSaleLineRequest {
    pub product_id: String,
    pub quantity: FfiQuantities,
    pub unit_price: Option<String>,
    pub batch_id: Option<String>,
}

impl FfiSaleLineRequest {
    fn parse(&self) -> Result<SaleLineRequest, PharmStockError> {
        Ok(SaleLineRequest {
            product_id: self.product_id.clone(),
            quantity: self.quantity.parse()?,
            unit_price: parse_opt_decimal("unit_price", self.unit_price.as_deref())?,
            batch_id: self.batch_id.clone(),
        })
    }
}

/// FFI-safe checkout request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckoutRequest {
    pub customer_name: String,
    pub patient_ref_no: Option<String>,
    pub is_direct_sale: bool,
    pub discount_amount: String,
    pub lines: Vec<FfiSaleLineRequest>,
}

impl FfiCheckoutRequest {
    fn parse(&self) -> Result<CheckoutRequest, PharmStockError> {
        Ok(CheckoutRequest {
            customer_name: self.customer_name.clone(),
            patient_ref_no: self.patient_ref_no.clone(),
            is_direct_sale: self.is_direct_sale,
            discount_amount: parse_decimal("discount_amount", &self.discount_amount)?,
            lines: self
                .lines
                .iter()
                .map(|l| l.parse())
                .collect::<Result<_, _>>()?,
        })
    }
}

/// FFI-safe bill line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSaleLine {
    pub product_id: String,
    pub product_name: String,
    pub batch_id: Option<String>,
    pub quantity: FfiQuantities,
    pub unit_price: String,
    pub line_total: String,
    pub transaction_id: String,
}

/// FFI-safe bill.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSale {
    pub id: String,
    pub bill_number: String,
    pub customer_name: String,
    pub total_amount: String,
    pub discount_amount: String,
    pub final_amount: String,
    pub sale_date: String,
    pub lines: Vec<FfiSaleLine>,
}

impl From<PharmacySale> for FfiSale {
    fn from(s: PharmacySale) -> Self {
        Self {
            id: s.id,
            bill_number: s.bill_number,
            customer_name: s.customer_name,
            total_amount: dec_to_sql(s.total_amount),
            discount_amount: dec_to_sql(s.discount_amount),
            final_amount: dec_to_sql(s.final_amount),
            sale_date: s.sale_date,
            lines: s
                .lines
                .into_iter()
                .map(|l| FfiSaleLine {
                    product_id: l.product_id,
                    product_name: l.product_name,
                    batch_id: l.batch_id,
                    quantity: l.quantity.into(),
                    unit_price: dec_to_sql(l.unit_price),
                    line_total: dec_to_sql(l.line_total),
                    transaction_id: l.transaction_id,
                })
                .collect(),
        }
    }
}

/// FFI-safe return request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReturnRequest {
    pub customer_name: String,
    pub original_bill_number: Option<String>,
    /// `wrong_medicine`, `expired`, `damaged`, `allergy`, `doctor_changed`,
    /// `extra` or `other`
    pub reason: String,
    pub reason_detail: Option<String>,
    pub lines: Vec<FfiSaleLineRequest>,
}

impl FfiReturnRequest {
    fn parse(&self) -> Result<ReturnRequest, PharmStockError> {
        let reason = ReturnReason::from_str(&self.reason)
            .ok_or_else(|| PharmStockError::InvalidInput(format!("reason: {}", self.reason)))?;
        Ok(ReturnRequest {
            customer_name: self.customer_name.clone(),
            original_bill_number: self.original_bill_number.clone(),
            reason,
            reason_detail: self.reason_detail.clone(),
            lines: self
                .lines
                .iter()
                .map(|l| l.parse())
                .collect::<Result<_, _>>()?,
        })
    }
}

/// FFI-safe returned line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReturnLine {
    pub product_id: String,
    pub product_name: String,
    pub batch_id: Option<String>,
    pub quantity: FfiQuantities,
    pub unit_price: String,
    pub refund_amount: String,
    pub transaction_id: String,
}

/// FFI-safe customer return.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReturn {
    pub id: String,
    pub return_number: String,
    pub original_bill_number: Option<String>,
    pub customer_name: String,
    pub reason: String,
    pub total_refund: String,
    pub return_date: String,
    pub lines: Vec<FfiReturnLine>,
}

impl From<MedicineReturn> for FfiReturn {
    fn from(r: MedicineReturn) -> Self {
        Self {
            id: r.id,
            return_number: r.return_number,
            original_bill_number: r.original_bill_number,
            customer_name: r.customer_name,
            reason: r.reason.as_str().to_string(),
            total_refund: dec_to_sql(r.total_refund),
            return_date: r.return_date,
            lines: r
                .lines
                .into_iter()
                .map(|l| FfiReturnLine {
                    product_id: l.product_id,
                    product_name: l.product_name,
                    batch_id: l.batch_id,
                    quantity: l.quantity.into(),
                    unit_price: dec_to_sql(l.unit_price),
                    refund_amount: dec_to_sql(l.refund_amount),
                    transaction_id: l.transaction_id,
                })
                .collect(),
        }
    }
}

/// FFI-safe distributor with derived balance.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDistributor {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub total_purchases: String,
    pub total_paid: String,
    pub balance_due: String,
    pub is_paid: bool,
}

impl From<Distributor> for FfiDistributor {
    fn from(d: Distributor) -> Self {
        Self {
            balance_due: dec_to_sql(d.balance_due()),
            is_paid: d.is_paid(),
            id: d.id,
            name: d.name,
            phone: d.phone,
            address: d.address,
            total_purchases: dec_to_sql(d.total_purchases),
            total_paid: dec_to_sql(d.total_paid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantities(boxes: &str, items: &str, subitems: &str) -> FfiQuantities {
        FfiQuantities {
            boxes: boxes.into(),
            items: items.into(),
            subitems: subitems.into(),
        }
    }

    fn panadol() -> FfiNewProduct {
        FfiNewProduct {
            name: "Panadol".into(),
            category_id: None,
            strength: Some("500mg".into()),
            rack_no: None,
            medicine_form: "tablet".into(),
            products_in_box: 1,
            items_per_product: 10,
            subitems_per_item: 10,
            track_batches: false,
            pricing: FfiPricingInput {
                gross_price: "400".into(),
                discount_percent: "10".into(),
                discount_amount: "0".into(),
                margin_percent: "0".into(),
                sale_price: Some("500".into()),
            },
        }
    }

    #[test]
    fn test_core_sale_flow() {
        let core = open_database_in_memory().unwrap();
        let product = core
            .create_product_with_initial_stock(panadol(), "1".into())
            .unwrap();
        assert_eq!(product.prices.net_price, "360");

        core.record_sale(product.id.clone(), quantities("0", "0", "35"), None, None, false)
            .unwrap();
        let stock = core.get_stock(product.id.clone()).unwrap();
        assert_eq!(stock.stock.subitems, "65");
        assert_eq!(stock.stock.items, "6");
        assert_eq!(stock.base_unit, "subitems");

        let err = core
            .record_sale(product.id, quantities("1", "0", "0"), None, None, false)
            .unwrap_err();
        assert!(matches!(err, PharmStockError::InsufficientStock(_)));
    }

    #[test]
    fn test_preview_prices() {
        let prices = preview_prices(
            10,
            10,
            FfiPricingInput {
                gross_price: "400".into(),
                discount_percent: "10".into(),
                discount_amount: "0".into(),
                margin_percent: "0".into(),
                sale_price: None,
            },
        )
        .unwrap();
        assert_eq!(prices.net_price, "360");
        assert_eq!(prices.price_per_item, "36");
        assert_eq!(prices.price_per_subitem, "3.6");
    }

    #[test]
    fn test_bad_input_is_invalid_input() {
        let core = open_database_in_memory().unwrap();
        let mut bad_form = panadol();
        bad_form.medicine_form = "lozenge".into();
        assert!(matches!(
            core.create_product_catalog_only(bad_form),
            Err(PharmStockError::InvalidInput(_))
        ));
        assert!(matches!(
            core.record_purchase("x".into(), quantities("one", "0", "0"), "1".into(), None),
            Err(PharmStockError::InvalidInput(_))
        ));
        assert!(matches!(
            core.get_stock("missing".into()),
            Err(PharmStockError::NotFound(_))
        ));
    }

    #[test]
    fn test_distributor_balance_over_ffi() {
        let core = open_database_in_memory().unwrap();
        let d = core
            .create_distributor("Medi Traders".into(), None, None)
            .unwrap();
        core.record_distributor_purchase(d.id.clone(), "10000".into(), None, "2026-01-18".into(), None)
            .unwrap();
        let after = core
            .record_distributor_payment(d.id, "4000".into(), "2026-01-19".into(), None, None)
            .unwrap();
        assert_eq!(after.balance_due, "6000");
        assert!(!after.is_paid);
    }
}
