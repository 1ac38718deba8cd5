//! Product batch operations.

use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{
    date_from_sql, date_to_sql, dec_from_sql, dec_to_sql, opt_dec_from_sql, Database, DbError,
    DbResult,
};
use crate::models::{ProductBatch, Quantities, StockLevel};

const BATCH_COLUMNS: &str = r#"
    id, received_seq, product_id, distributor_id, batch_no, expiry_date,
    initial_packs, initial_items, initial_subitems,
    current_packs, current_items, current_subitems, stock_deficit,
    purchase_price_per_pack, sale_price_per_pack, is_active, created_at
"#;

impl Database {
    /// Receipt sequence for the next batch.
    pub fn next_batch_seq(&self) -> DbResult<i64> {
        let seq: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(received_seq), 0) + 1 FROM product_batches",
            [],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    pub fn insert_batch(&self, batch: &ProductBatch) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO product_batches (
                id, received_seq, product_id, distributor_id, batch_no, expiry_date,
                initial_packs, initial_items, initial_subitems,
                current_packs, current_items, current_subitems, stock_deficit,
                purchase_price_per_pack, sale_price_per_pack, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                batch.id,
                batch.received_seq,
                batch.product_id,
                batch.distributor_id,
                batch.batch_no,
                batch.expiry_date.map(date_to_sql),
                dec_to_sql(batch.initial.boxes),
                dec_to_sql(batch.initial.items),
                dec_to_sql(batch.initial.subitems),
                dec_to_sql(batch.current.boxes),
                dec_to_sql(batch.current.items),
                dec_to_sql(batch.current.subitems),
                dec_to_sql(batch.stock_deficit),
                batch.purchase_price_per_pack.map(dec_to_sql),
                batch.sale_price_per_pack.map(dec_to_sql),
                batch.is_active,
                batch.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_batch(&self, id: &str) -> DbResult<Option<ProductBatch>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {} FROM product_batches WHERE id = ?", BATCH_COLUMNS),
                [id],
                BatchRow::from_row,
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    /// All batches of a product in receipt order, active or not.
    pub fn list_batches_for_product(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM product_batches WHERE product_id = ? ORDER BY received_seq",
            BATCH_COLUMNS
        ))?;
        let rows = stmt.query_map([product_id], BatchRow::from_row)?;

        let mut batches = Vec::new();
        for row in rows {
            batches.push(row?.try_into()?);
        }
        Ok(batches)
    }

    /// Overwrite only the cached stock columns of a batch.
    pub fn update_batch_stock(
        &self,
        id: &str,
        level: &StockLevel,
        deficit: Decimal,
        is_active: bool,
    ) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE product_batches
            SET current_packs = ?1, current_items = ?2, current_subitems = ?3,
                stock_deficit = ?4, is_active = ?5
            WHERE id = ?6
            "#,
            params![
                dec_to_sql(level.boxes),
                dec_to_sql(level.items),
                dec_to_sql(level.subitems),
                dec_to_sql(deficit),
                is_active,
                id,
            ],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("batch {}", id)));
        }
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct BatchRow {
    id: String,
    received_seq: i64,
    product_id: String,
    distributor_id: Option<String>,
    batch_no: String,
    expiry_date: Option<String>,
    initial: [String; 3],
    current: [String; 3],
    stock_deficit: String,
    purchase_price_per_pack: Option<String>,
    sale_price_per_pack: Option<String>,
    is_active: bool,
    created_at: String,
}

impl BatchRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            received_seq: row.get(1)?,
            product_id: row.get(2)?,
            distributor_id: row.get(3)?,
            batch_no: row.get(4)?,
            expiry_date: row.get(5)?,
            initial: [row.get(6)?, row.get(7)?, row.get(8)?],
            current: [row.get(9)?, row.get(10)?, row.get(11)?],
            stock_deficit: row.get(12)?,
            purchase_price_per_pack: row.get(13)?,
            sale_price_per_pack: row.get(14)?,
            is_active: row.get(15)?,
            created_at: row.get(16)?,
        })
    }
}

impl TryFrom<BatchRow> for ProductBatch {
    type Error = DbError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let [initial_packs, initial_items, initial_subitems] = &row.initial;
        let [current_packs, current_items, current_subitems] = &row.current;

        Ok(ProductBatch {
            id: row.id,
            product_id: row.product_id,
            distributor_id: row.distributor_id,
            batch_no: row.batch_no,
            expiry_date: row
                .expiry_date
                .as_deref()
                .map(|raw| date_from_sql("expiry_date", raw))
                .transpose()?,
            initial: Quantities::new(
                dec_from_sql("initial_packs", initial_packs)?,
                dec_from_sql("initial_items", initial_items)?,
                dec_from_sql("initial_subitems", initial_subitems)?,
            ),
            current: StockLevel {
                boxes: dec_from_sql("current_packs", current_packs)?,
                items: dec_from_sql("current_items", current_items)?,
                subitems: dec_from_sql("current_subitems", current_subitems)?,
            },
            stock_deficit: dec_from_sql("stock_deficit", &row.stock_deficit)?,
            purchase_price_per_pack: opt_dec_from_sql(
                "purchase_price_per_pack",
                row.purchase_price_per_pack,
            )?,
            sale_price_per_pack: opt_dec_from_sql("sale_price_per_pack", row.sale_price_per_pack)?,
            is_active: row.is_active,
            received_seq: row.received_seq,
            created_at: row.created_at,
        })
    }
}
