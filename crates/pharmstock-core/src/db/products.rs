//! Product database operations.

use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{dec_from_sql, dec_to_sql, Database, DbError, DbResult};
use crate::models::{ConversionFactors, MedicineForm, Product, StockLevel};

const PRODUCT_COLUMNS: &str = r#"
    id, name, category_id, strength, rack_no, medicine_form,
    products_in_box, items_per_product, subitems_per_item, track_batches, pricing,
    total_boxes, total_items, total_subitems, stock_deficit, created_at, updated_at
"#;

impl Database {
    /// Insert a new product with its cached stock.
    pub fn insert_product(&self, product: &Product) -> DbResult<()> {
        let pricing_json = serde_json::to_string(&product.pricing)?;

        self.conn.execute(
            r#"
            INSERT INTO products (
                id, name, category_id, strength, rack_no, medicine_form,
                products_in_box, items_per_product, subitems_per_item, track_batches, pricing,
                total_boxes, total_items, total_subitems, stock_deficit, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                product.id,
                product.name,
                product.category_id,
                product.strength,
                product.rack_no,
                product.medicine_form.as_str(),
                product.factors.products_in_box,
                product.factors.items_per_product,
                product.factors.subitems_per_item,
                product.track_batches,
                pricing_json,
                dec_to_sql(product.stock.boxes),
                dec_to_sql(product.stock.items),
                dec_to_sql(product.stock.subitems),
                dec_to_sql(product.stock_deficit),
                product.created_at,
                product.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a product by ID.
    pub fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS),
                [id],
                ProductRow::from_row,
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    /// All products ordered by name.
    pub fn list_products(&self) -> DbResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY name, id",
            PRODUCT_COLUMNS
        ))?;
        let rows = stmt.query_map([], ProductRow::from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?.try_into()?);
        }
        Ok(products)
    }

    /// Overwrite only the cached stock columns of a product.
    pub fn update_product_stock(
        &self,
        id: &str,
        level: &StockLevel,
        deficit: Decimal,
        updated_at: &str,
    ) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE products
            SET total_boxes = ?1, total_items = ?2, total_subitems = ?3,
                stock_deficit = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
            params![
                dec_to_sql(level.boxes),
                dec_to_sql(level.items),
                dec_to_sql(level.subitems),
                dec_to_sql(deficit),
                updated_at,
                id,
            ],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("product {}", id)));
        }
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct ProductRow {
    id: String,
    name: String,
    category_id: Option<i64>,
    strength: Option<String>,
    rack_no: Option<String>,
    medicine_form: String,
    products_in_box: u32,
    items_per_product: u32,
    subitems_per_item: u32,
    track_batches: bool,
    pricing: String,
    total_boxes: String,
    total_items: String,
    total_subitems: String,
    stock_deficit: String,
    created_at: String,
    updated_at: String,
}

impl ProductRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category_id: row.get(2)?,
            strength: row.get(3)?,
            rack_no: row.get(4)?,
            medicine_form: row.get(5)?,
            products_in_box: row.get(6)?,
            items_per_product: row.get(7)?,
            subitems_per_item: row.get(8)?,
            track_batches: row.get(9)?,
            pricing: row.get(10)?,
            total_boxes: row.get(11)?,
            total_items: row.get(12)?,
            total_subitems: row.get(13)?,
            stock_deficit: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let medicine_form =
            MedicineForm::from_str(&row.medicine_form).ok_or_else(|| DbError::InvalidValue {
                column: "medicine_form",
                value: row.medicine_form.clone(),
            })?;

        Ok(Product {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            strength: row.strength,
            rack_no: row.rack_no,
            medicine_form,
            factors: ConversionFactors::clamped(
                row.products_in_box,
                row.items_per_product,
                row.subitems_per_item,
            ),
            track_batches: row.track_batches,
            pricing: serde_json::from_str(&row.pricing)?,
            stock: StockLevel {
                boxes: dec_from_sql("total_boxes", &row.total_boxes)?,
                items: dec_from_sql("total_items", &row.total_items)?,
                subitems: dec_from_sql("total_subitems", &row.total_subitems)?,
            },
            stock_deficit: dec_from_sql("stock_deficit", &row.stock_deficit)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
