//! Ledger (inventory_transactions) operations.
//!
//! Rows are only ever inserted; the schema triggers reject updates and
//! deletes.

use rusqlite::{params, OptionalExtension, Row};

use super::{dec_from_sql, dec_to_sql, Database, DbError, DbResult};
use crate::models::{LedgerEntry, Quantities, TransactionType};

const ENTRY_COLUMNS: &str = r#"
    id, product_id, batch_id, transaction_type,
    quantity_boxes, quantity_items, quantity_subitems,
    quantity_boxes_out, quantity_items_out, quantity_subitems_out,
    unit_purchase_price, unit_sale_price, notes, created_at
"#;

impl Database {
    /// Append an entry at the end of the ledger.
    pub fn append_ledger_entry(&self, entry: &LedgerEntry) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO inventory_transactions (
                id, seq, product_id, batch_id, transaction_type,
                quantity_boxes, quantity_items, quantity_subitems,
                quantity_boxes_out, quantity_items_out, quantity_subitems_out,
                unit_purchase_price, unit_sale_price, notes, created_at
            ) VALUES (
                ?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM inventory_transactions),
                ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14
            )
            "#,
            params![
                entry.id,
                entry.product_id,
                entry.batch_id,
                entry.txn_type.as_str(),
                dec_to_sql(entry.incoming.boxes),
                dec_to_sql(entry.incoming.items),
                dec_to_sql(entry.incoming.subitems),
                dec_to_sql(entry.outgoing.boxes),
                dec_to_sql(entry.outgoing.items),
                dec_to_sql(entry.outgoing.subitems),
                dec_to_sql(entry.unit_purchase_price),
                dec_to_sql(entry.unit_sale_price),
                entry.notes,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_ledger_entry(&self, id: &str) -> DbResult<Option<LedgerEntry>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {} FROM inventory_transactions WHERE id = ?", ENTRY_COLUMNS),
                [id],
                LedgerRow::from_row,
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    /// Every entry of a product, in append order.
    pub fn ledger_entries_for_product(&self, product_id: &str) -> DbResult<Vec<LedgerEntry>> {
        self.query_entries(
            &format!(
                "SELECT {} FROM inventory_transactions WHERE product_id = ?1 ORDER BY seq",
                ENTRY_COLUMNS
            ),
            params![product_id],
        )
    }

    /// Every entry tagged with a batch, in append order.
    pub fn ledger_entries_for_batch(&self, batch_id: &str) -> DbResult<Vec<LedgerEntry>> {
        self.query_entries(
            &format!(
                "SELECT {} FROM inventory_transactions WHERE batch_id = ?1 ORDER BY seq",
                ENTRY_COLUMNS
            ),
            params![batch_id],
        )
    }

    /// Latest `limit` entries of a product, newest first.
    pub fn recent_ledger_entries(&self, product_id: &str, limit: usize) -> DbResult<Vec<LedgerEntry>> {
        self.query_entries(
            &format!(
                r#"
                SELECT {} FROM inventory_transactions
                WHERE product_id = ?1
                ORDER BY seq DESC
                LIMIT ?2
                "#,
                ENTRY_COLUMNS
            ),
            params![product_id, limit as i64],
        )
    }

    /// Entries created in `[from, until)`, compared as RFC 3339 text.
    pub fn ledger_entries_between(&self, from: &str, until: &str) -> DbResult<Vec<LedgerEntry>> {
        self.query_entries(
            &format!(
                r#"
                SELECT {} FROM inventory_transactions
                WHERE created_at >= ?1 AND created_at < ?2
                ORDER BY seq
                "#,
                ENTRY_COLUMNS
            ),
            params![from, until],
        )
    }

    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> DbResult<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, LedgerRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }
}

/// Intermediate row struct for database mapping.
struct LedgerRow {
    id: String,
    product_id: String,
    batch_id: Option<String>,
    transaction_type: String,
    quantities: [String; 6],
    unit_purchase_price: String,
    unit_sale_price: String,
    notes: Option<String>,
    created_at: String,
}

impl LedgerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            product_id: row.get(1)?,
            batch_id: row.get(2)?,
            transaction_type: row.get(3)?,
            quantities: [
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ],
            unit_purchase_price: row.get(10)?,
            unit_sale_price: row.get(11)?,
            notes: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let txn_type = TransactionType::from_str(&row.transaction_type).ok_or_else(|| {
            DbError::InvalidValue {
                column: "transaction_type",
                value: row.transaction_type.clone(),
            }
        })?;
        let [b_in, i_in, s_in, b_out, i_out, s_out] = &row.quantities;

        Ok(LedgerEntry {
            id: row.id,
            product_id: row.product_id,
            batch_id: row.batch_id,
            txn_type,
            incoming: Quantities::new(
                dec_from_sql("quantity_boxes", b_in)?,
                dec_from_sql("quantity_items", i_in)?,
                dec_from_sql("quantity_subitems", s_in)?,
            ),
            outgoing: Quantities::new(
                dec_from_sql("quantity_boxes_out", b_out)?,
                dec_from_sql("quantity_items_out", i_out)?,
                dec_from_sql("quantity_subitems_out", s_out)?,
            ),
            unit_purchase_price: dec_from_sql("unit_purchase_price", &row.unit_purchase_price)?,
            unit_sale_price: dec_from_sql("unit_sale_price", &row.unit_sale_price)?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}
