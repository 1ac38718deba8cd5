//! Distributor payables operations.

use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{date_from_sql, date_to_sql, dec_from_sql, dec_to_sql, Database, DbError, DbResult};
use crate::models::{Distributor, DistributorPayment, DistributorPurchase};

impl Database {
    pub fn insert_distributor(&self, distributor: &Distributor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO distributors (id, name, phone, address, total_purchases, total_paid, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                distributor.id,
                distributor.name,
                distributor.phone,
                distributor.address,
                dec_to_sql(distributor.total_purchases),
                dec_to_sql(distributor.total_paid),
                distributor.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_distributor(&self, id: &str) -> DbResult<Option<Distributor>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, name, phone, address, total_purchases, total_paid, created_at
                FROM distributors WHERE id = ?
                "#,
                [id],
                DistributorRow::from_row,
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    pub fn list_distributors(&self) -> DbResult<Vec<Distributor>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, phone, address, total_purchases, total_paid, created_at
            FROM distributors ORDER BY name, id
            "#,
        )?;
        let rows = stmt.query_map([], DistributorRow::from_row)?;

        let mut distributors = Vec::new();
        for row in rows {
            distributors.push(row?.try_into()?);
        }
        Ok(distributors)
    }

    pub fn insert_distributor_purchase(&self, purchase: &DistributorPurchase) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO distributor_purchases (id, distributor_id, invoice_no, amount, purchase_date, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                purchase.id,
                purchase.distributor_id,
                purchase.invoice_no,
                dec_to_sql(purchase.amount),
                date_to_sql(purchase.purchase_date),
                purchase.notes,
                purchase.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn insert_distributor_payment(&self, payment: &DistributorPayment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO distributor_payments (id, distributor_id, amount, payment_date, method, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                payment.id,
                payment.distributor_id,
                dec_to_sql(payment.amount),
                date_to_sql(payment.payment_date),
                payment.method,
                payment.notes,
                payment.created_at,
            ],
        )?;
        Ok(())
    }

    /// Purchase invoices of a distributor, oldest first.
    pub fn list_distributor_purchases(&self, distributor_id: &str) -> DbResult<Vec<DistributorPurchase>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, distributor_id, invoice_no, amount, purchase_date, notes, created_at
            FROM distributor_purchases
            WHERE distributor_id = ?
            ORDER BY purchase_date, created_at
            "#,
        )?;
        let rows = stmt.query_map([distributor_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut purchases = Vec::new();
        for row in rows {
            let (id, distributor_id, invoice_no, amount, purchase_date, notes, created_at) = row?;
            purchases.push(DistributorPurchase {
                id,
                distributor_id,
                invoice_no,
                amount: dec_from_sql("amount", &amount)?,
                purchase_date: date_from_sql("purchase_date", &purchase_date)?,
                notes,
                created_at,
            });
        }
        Ok(purchases)
    }

    /// Payments to a distributor, oldest first.
    pub fn list_distributor_payments(&self, distributor_id: &str) -> DbResult<Vec<DistributorPayment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, distributor_id, amount, payment_date, method, notes, created_at
            FROM distributor_payments
            WHERE distributor_id = ?
            ORDER BY payment_date, created_at
            "#,
        )?;
        let rows = stmt.query_map([distributor_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut payments = Vec::new();
        for row in rows {
            let (id, distributor_id, amount, payment_date, method, notes, created_at) = row?;
            payments.push(DistributorPayment {
                id,
                distributor_id,
                amount: dec_from_sql("amount", &amount)?,
                payment_date: date_from_sql("payment_date", &payment_date)?,
                method,
                notes,
                created_at,
            });
        }
        Ok(payments)
    }

    /// Overwrite the cached totals of a distributor.
    pub fn update_distributor_totals(
        &self,
        id: &str,
        total_purchases: Decimal,
        total_paid: Decimal,
    ) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            "UPDATE distributors SET total_purchases = ?1, total_paid = ?2 WHERE id = ?3",
            params![dec_to_sql(total_purchases), dec_to_sql(total_paid), id],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("distributor {}", id)));
        }
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct DistributorRow {
    id: String,
    name: String,
    phone: Option<String>,
    address: Option<String>,
    total_purchases: String,
    total_paid: String,
    created_at: String,
}

impl DistributorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            address: row.get(3)?,
            total_purchases: row.get(4)?,
            total_paid: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TryFrom<DistributorRow> for Distributor {
    type Error = DbError;

    fn try_from(row: DistributorRow) -> Result<Self, Self::Error> {
        Ok(Distributor {
            id: row.id,
            name: row.name,
            phone: row.phone,
            address: row.address,
            total_purchases: dec_from_sql("total_purchases", &row.total_purchases)?,
            total_paid: dec_from_sql("total_paid", &row.total_paid)?,
            created_at: row.created_at,
        })
    }
}
