//! Database layer for pharmstock.

mod batches;
mod categories;
mod distributors;
mod ledger;
mod products;
mod sales;
mod schema;

pub use schema::*;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use thiserror::Error;

/// Default time a writer waits for another station's lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid stored value in {column}: {value:?}")]
    InvalidValue { column: &'static str, value: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open database at path, waiting up to `busy_timeout` for competing writers.
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` as one unit of work under SQLite's write lock.
    ///
    /// The lock is taken up front (`BEGIN IMMEDIATE`), so reads made inside
    /// `f` cannot be invalidated by another connection before the commit.
    /// Any error rolls everything back. Units of work do not nest.
    pub fn atomic<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}

/// Canonical text form of a decimal column.
pub(crate) fn dec_to_sql(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn dec_from_sql(column: &'static str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw).map_err(|_| DbError::InvalidValue {
        column,
        value: raw.to_string(),
    })
}

pub(crate) fn opt_dec_from_sql(column: &'static str, raw: Option<String>) -> DbResult<Option<Decimal>> {
    raw.map(|value| dec_from_sql(column, &value)).transpose()
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(column: &'static str, raw: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| DbError::InvalidValue {
        column,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in [
            "products",
            "product_categories",
            "inventory_transactions",
            "product_batches",
            "distributors",
            "distributor_purchases",
            "distributor_payments",
            "pharmacy_sales",
            "medicine_returns",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();

        let result: DbResult<()> = db.atomic(|db| {
            db.conn()
                .execute("INSERT INTO product_categories (name) VALUES ('Analgesics')", [])?;
            Err(DbError::Constraint("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM product_categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_atomic_commits() {
        let db = Database::open_in_memory().unwrap();
        db.atomic(|db| -> DbResult<()> {
            db.conn()
                .execute("INSERT INTO product_categories (name) VALUES ('Antibiotics')", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM product_categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_decimal_text_is_canonical() {
        assert_eq!(dec_to_sql(Decimal::new(3600, 2)), "36");
        assert_eq!(dec_to_sql(Decimal::new(-0, 2)), "0");
        assert_eq!(dec_from_sql("x", "3.6").unwrap(), Decimal::new(36, 1));
        assert!(dec_from_sql("x", "abc").is_err());
    }
}
