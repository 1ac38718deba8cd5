//! Pharmacy bill and customer return operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{dec_from_sql, dec_to_sql, Database, DbError, DbResult};
use crate::models::{MedicineReturn, PharmacySale, ReturnLine, ReturnReason, SaleLine};

const SALE_COLUMNS: &str = r#"
    id, bill_number, patient_ref_no, customer_name, total_amount,
    discount_amount, final_amount, is_direct_sale, sale_date
"#;

const RETURN_COLUMNS: &str = r#"
    id, return_number, original_bill_number, customer_name, reason,
    reason_detail, total_refund, return_date
"#;

impl Database {
    /// Next daily sequence number for documents like `PREFIX-YYYYMMDD-NNN`.
    ///
    /// Must run inside the unit of work that inserts the document.
    pub fn next_document_sequence(&self, prefix: &str, date: NaiveDate) -> DbResult<u32> {
        let pattern = format!("{}-{}-%", prefix, date.format("%Y%m%d"));
        let sql = match prefix {
            "BILL" => "SELECT COUNT(*) FROM pharmacy_sales WHERE bill_number LIKE ?",
            "RET" => "SELECT COUNT(*) FROM medicine_returns WHERE return_number LIKE ?",
            other => return Err(DbError::Constraint(format!("unknown document prefix {}", other))),
        };
        let count: u32 = self.conn.query_row(sql, [pattern], |row| row.get(0))?;
        Ok(count + 1)
    }

    /// Insert a bill and its lines.
    pub fn insert_sale(&self, sale: &PharmacySale) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO pharmacy_sales (
                id, bill_number, patient_ref_no, customer_name, total_amount,
                discount_amount, final_amount, is_direct_sale, sale_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                sale.id,
                sale.bill_number,
                sale.patient_ref_no,
                sale.customer_name,
                dec_to_sql(sale.total_amount),
                dec_to_sql(sale.discount_amount),
                dec_to_sql(sale.final_amount),
                sale.is_direct_sale,
                sale.sale_date,
            ],
        )?;

        for line in &sale.lines {
            self.conn.execute(
                r#"
                INSERT INTO pharmacy_sale_items (
                    sale_id, product_id, product_name, batch_id, quantity,
                    unit_price, line_total, transaction_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    sale.id,
                    line.product_id,
                    line.product_name,
                    line.batch_id,
                    serde_json::to_string(&line.quantity)?,
                    dec_to_sql(line.unit_price),
                    dec_to_sql(line.line_total),
                    line.transaction_id,
                ],
            )?;
        }
        Ok(())
    }

    pub fn get_sale_by_bill_number(&self, bill_number: &str) -> DbResult<Option<PharmacySale>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pharmacy_sales WHERE bill_number = ?", SALE_COLUMNS),
                [bill_number],
                SaleRow::from_row,
            )
            .optional()?;

        match result {
            Some(row) => Ok(Some(self.hydrate_sale(row)?)),
            None => Ok(None),
        }
    }

    /// Bills dated in `[from, until)`, compared as RFC 3339 text.
    pub fn sales_between(&self, from: &str, until: &str) -> DbResult<Vec<PharmacySale>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM pharmacy_sales
            WHERE sale_date >= ?1 AND sale_date < ?2
            ORDER BY sale_date
            "#,
            SALE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![from, until], SaleRow::from_row)?;

        let mut sales = Vec::new();
        for row in rows {
            sales.push(self.hydrate_sale(row?)?);
        }
        Ok(sales)
    }

    fn hydrate_sale(&self, row: SaleRow) -> DbResult<PharmacySale> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, product_name, batch_id, quantity, unit_price, line_total, transaction_id
            FROM pharmacy_sale_items
            WHERE sale_id = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([&row.id], LineRow::from_row)?;

        let mut lines = Vec::new();
        for line in rows {
            let line = line?;
            lines.push(SaleLine {
                product_id: line.product_id,
                product_name: line.product_name,
                batch_id: line.batch_id,
                quantity: serde_json::from_str(&line.quantity)?,
                unit_price: dec_from_sql("unit_price", &line.unit_price)?,
                line_total: dec_from_sql("line_total", &line.amount)?,
                transaction_id: line.transaction_id,
            });
        }

        Ok(PharmacySale {
            id: row.id,
            bill_number: row.bill_number,
            patient_ref_no: row.patient_ref_no,
            customer_name: row.customer_name,
            total_amount: dec_from_sql("total_amount", &row.total_amount)?,
            discount_amount: dec_from_sql("discount_amount", &row.discount_amount)?,
            final_amount: dec_from_sql("final_amount", &row.final_amount)?,
            is_direct_sale: row.is_direct_sale,
            sale_date: row.sale_date,
            lines,
        })
    }

    /// Insert a customer return and its lines.
    pub fn insert_return(&self, ret: &MedicineReturn) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medicine_returns (
                id, return_number, original_bill_number, customer_name, reason,
                reason_detail, total_refund, return_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                ret.id,
                ret.return_number,
                ret.original_bill_number,
                ret.customer_name,
                ret.reason.as_str(),
                ret.reason_detail,
                dec_to_sql(ret.total_refund),
                ret.return_date,
            ],
        )?;

        for line in &ret.lines {
            self.conn.execute(
                r#"
                INSERT INTO medicine_return_items (
                    return_id, product_id, product_name, batch_id, quantity,
                    unit_price, refund_amount, transaction_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    ret.id,
                    line.product_id,
                    line.product_name,
                    line.batch_id,
                    serde_json::to_string(&line.quantity)?,
                    dec_to_sql(line.unit_price),
                    dec_to_sql(line.refund_amount),
                    line.transaction_id,
                ],
            )?;
        }
        Ok(())
    }

    pub fn get_return_by_number(&self, return_number: &str) -> DbResult<Option<MedicineReturn>> {
        let result = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM medicine_returns WHERE return_number = ?",
                    RETURN_COLUMNS
                ),
                [return_number],
                ReturnRow::from_row,
            )
            .optional()?;

        let Some(row) = result else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, product_name, batch_id, quantity, unit_price, refund_amount, transaction_id
            FROM medicine_return_items
            WHERE return_id = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([&row.id], LineRow::from_row)?;

        let mut lines = Vec::new();
        for line in rows {
            let line = line?;
            lines.push(ReturnLine {
                product_id: line.product_id,
                product_name: line.product_name,
                batch_id: line.batch_id,
                quantity: serde_json::from_str(&line.quantity)?,
                unit_price: dec_from_sql("unit_price", &line.unit_price)?,
                refund_amount: dec_from_sql("refund_amount", &line.amount)?,
                transaction_id: line.transaction_id,
            });
        }

        let reason = ReturnReason::from_str(&row.reason).ok_or_else(|| DbError::InvalidValue {
            column: "reason",
            value: row.reason.clone(),
        })?;

        Ok(Some(MedicineReturn {
            id: row.id,
            return_number: row.return_number,
            original_bill_number: row.original_bill_number,
            customer_name: row.customer_name,
            reason,
            reason_detail: row.reason_detail,
            total_refund: dec_from_sql("total_refund", &row.total_refund)?,
            return_date: row.return_date,
            lines,
        }))
    }

    /// Refund totals of returns dated in `[from, until)`.
    pub fn refunds_between(&self, from: &str, until: &str) -> DbResult<Vec<Decimal>> {
        let mut stmt = self.conn.prepare(
            "SELECT total_refund FROM medicine_returns WHERE return_date >= ?1 AND return_date < ?2",
        )?;
        let rows = stmt.query_map(params![from, until], |row| row.get::<_, String>(0))?;

        let mut refunds = Vec::new();
        for row in rows {
            refunds.push(dec_from_sql("total_refund", &row?)?);
        }
        Ok(refunds)
    }
}

/// Intermediate row struct for database mapping.
struct SaleRow {
    id: String,
    bill_number: String,
    patient_ref_no: Option<String>,
    customer_name: String,
    total_amount: String,
    discount_amount: String,
    final_amount: String,
    is_direct_sale: bool,
    sale_date: String,
}

impl SaleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            bill_number: row.get(1)?,
            patient_ref_no: row.get(2)?,
            customer_name: row.get(3)?,
            total_amount: row.get(4)?,
            discount_amount: row.get(5)?,
            final_amount: row.get(6)?,
            is_direct_sale: row.get(7)?,
            sale_date: row.get(8)?,
        })
    }
}

struct ReturnRow {
    id: String,
    return_number: String,
    original_bill_number: Option<String>,
    customer_name: String,
    reason: String,
    reason_detail: Option<String>,
    total_refund: String,
    return_date: String,
}

impl ReturnRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            return_number: row.get(1)?,
            original_bill_number: row.get(2)?,
            customer_name: row.get(3)?,
            reason: row.get(4)?,
            reason_detail: row.get(5)?,
            total_refund: row.get(6)?,
            return_date: row.get(7)?,
        })
    }
}

/// Shared shape of bill lines and return lines.
struct LineRow {
    product_id: String,
    product_name: String,
    batch_id: Option<String>,
    quantity: String,
    unit_price: String,
    amount: String,
    transaction_id: String,
}

impl LineRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            batch_id: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
            amount: row.get(5)?,
            transaction_id: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::products::fixtures::tablet_product;
    use super::*;
    use crate::models::{document_number, new_id, now_timestamp, LedgerEntry, Quantities, TransactionType};

    fn setup() -> (Database, LedgerEntry) {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&tablet_product("p1")).unwrap();
        let entry = LedgerEntry::new("p1", TransactionType::Sale, Quantities::subitems(10));
        db.append_ledger_entry(&entry).unwrap();
        (db, entry)
    }

    fn sale(bill_number: String, transaction_id: &str) -> PharmacySale {
        PharmacySale {
            id: new_id(),
            bill_number,
            patient_ref_no: None,
            customer_name: "Walk-in Customer".into(),
            total_amount: Decimal::from(45),
            discount_amount: Decimal::from(5),
            final_amount: Decimal::from(40),
            is_direct_sale: true,
            sale_date: now_timestamp(),
            lines: vec![SaleLine {
                product_id: "p1".into(),
                product_name: "Tablet p1".into(),
                batch_id: None,
                quantity: Quantities::new(Decimal::new(1, 1), Decimal::ONE, Decimal::TEN),
                unit_price: Decimal::from(450),
                line_total: Decimal::from(45),
                transaction_id: transaction_id.into(),
            }],
        }
    }

    #[test]
    fn test_daily_sequence() {
        let (db, entry) = setup();
        let today = NaiveDate::from_ymd_opt(2026, 1, 18).unwrap();
        assert_eq!(db.next_document_sequence("BILL", today).unwrap(), 1);

        db.insert_sale(&sale(document_number("BILL", today, 1), &entry.id))
            .unwrap();
        assert_eq!(db.next_document_sequence("BILL", today).unwrap(), 2);

        // Other days and other document kinds count separately
        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(db.next_document_sequence("BILL", tomorrow).unwrap(), 1);
        assert_eq!(db.next_document_sequence("RET", today).unwrap(), 1);
        assert!(db.next_document_sequence("XYZ", today).is_err());
    }

    #[test]
    fn test_sale_roundtrip() {
        let (db, entry) = setup();
        let original = sale("BILL-20260118-001".into(), &entry.id);
        db.insert_sale(&original).unwrap();

        let loaded = db.get_sale_by_bill_number("BILL-20260118-001").unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(db.insert_sale(&original).is_err(), "bill numbers are unique");
    }

    #[test]
    fn test_return_roundtrip() {
        let (db, entry) = setup();
        let ret = MedicineReturn {
            id: new_id(),
            return_number: "RET-20260118-001".into(),
            original_bill_number: None,
            customer_name: "Ayesha".into(),
            reason: ReturnReason::Allergy,
            reason_detail: Some("rash".into()),
            total_refund: Decimal::from(45),
            return_date: now_timestamp(),
            lines: vec![ReturnLine {
                product_id: "p1".into(),
                product_name: "Tablet p1".into(),
                batch_id: None,
                quantity: Quantities::subitems(10),
                unit_price: Decimal::from(450),
                refund_amount: Decimal::from(45),
                transaction_id: entry.id.clone(),
            }],
        };
        db.insert_return(&ret).unwrap();

        let loaded = db.get_return_by_number("RET-20260118-001").unwrap().unwrap();
        assert_eq!(loaded, ret);
        assert_eq!(
            db.refunds_between("0000", "9999").unwrap(),
            vec![Decimal::from(45)]
        );
    }
}
