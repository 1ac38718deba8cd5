//! SQLite schema definition.
//!
//! Decimal columns are TEXT holding canonical decimal strings; arithmetic on
//! them happens in Rust, never in SQL.

/// Complete database schema for pharmstock.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS product_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category_id INTEGER REFERENCES product_categories(id) ON DELETE SET NULL,
    strength TEXT,
    rack_no TEXT,
    medicine_form TEXT NOT NULL,
    products_in_box INTEGER NOT NULL CHECK (products_in_box >= 1),
    items_per_product INTEGER NOT NULL CHECK (items_per_product >= 1),
    subitems_per_item INTEGER NOT NULL CHECK (subitems_per_item >= 1),
    track_batches INTEGER NOT NULL DEFAULT 0,
    pricing TEXT NOT NULL,                       -- JSON PriceBreakdown
    -- Cached stock (derived from inventory_transactions)
    total_boxes TEXT NOT NULL DEFAULT '0',
    total_items TEXT NOT NULL DEFAULT '0',
    total_subitems TEXT NOT NULL DEFAULT '0',
    stock_deficit TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);

-- ============================================================================
-- Distributors (payables)
-- ============================================================================

CREATE TABLE IF NOT EXISTS distributors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT,
    address TEXT,
    -- Cached totals (full re-aggregation of the two fact tables below)
    total_purchases TEXT NOT NULL DEFAULT '0',
    total_paid TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS distributor_purchases (
    id TEXT PRIMARY KEY,
    distributor_id TEXT NOT NULL REFERENCES distributors(id),
    invoice_no TEXT,
    amount TEXT NOT NULL,
    purchase_date TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS distributor_payments (
    id TEXT PRIMARY KEY,
    distributor_id TEXT NOT NULL REFERENCES distributors(id),
    amount TEXT NOT NULL,
    payment_date TEXT NOT NULL,
    method TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dist_purchases_owner ON distributor_purchases(distributor_id);
CREATE INDEX IF NOT EXISTS idx_dist_payments_owner ON distributor_payments(distributor_id);

-- ============================================================================
-- Batches
-- ============================================================================

CREATE TABLE IF NOT EXISTS product_batches (
    id TEXT PRIMARY KEY,
    received_seq INTEGER NOT NULL UNIQUE,        -- receipt order, FEFO tie-break
    product_id TEXT NOT NULL REFERENCES products(id),
    distributor_id TEXT REFERENCES distributors(id),
    batch_no TEXT NOT NULL,
    expiry_date TEXT,                            -- YYYY-MM-DD
    initial_packs TEXT NOT NULL,
    initial_items TEXT NOT NULL,
    initial_subitems TEXT NOT NULL,
    -- Cached stock (derived from batch-tagged inventory_transactions)
    current_packs TEXT NOT NULL DEFAULT '0',
    current_items TEXT NOT NULL DEFAULT '0',
    current_subitems TEXT NOT NULL DEFAULT '0',
    stock_deficit TEXT NOT NULL DEFAULT '0',
    purchase_price_per_pack TEXT,
    sale_price_per_pack TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_batches_product ON product_batches(product_id, is_active);

-- ============================================================================
-- Ledger (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory_transactions (
    id TEXT PRIMARY KEY,
    seq INTEGER NOT NULL UNIQUE,                 -- append order
    product_id TEXT NOT NULL REFERENCES products(id),
    batch_id TEXT REFERENCES product_batches(id),
    transaction_type TEXT NOT NULL CHECK (transaction_type IN ('PUR', 'SALE', 'RET', 'IN', 'OUT')),
    quantity_boxes TEXT NOT NULL DEFAULT '0',
    quantity_items TEXT NOT NULL DEFAULT '0',
    quantity_subitems TEXT NOT NULL DEFAULT '0',
    quantity_boxes_out TEXT NOT NULL DEFAULT '0',
    quantity_items_out TEXT NOT NULL DEFAULT '0',
    quantity_subitems_out TEXT NOT NULL DEFAULT '0',
    unit_purchase_price TEXT NOT NULL DEFAULT '0',
    unit_sale_price TEXT NOT NULL DEFAULT '0',
    notes TEXT,
    created_at TEXT NOT NULL
);

-- Outgoing types carry nothing on the incoming side and vice versa
CREATE TRIGGER IF NOT EXISTS inventory_transactions_check_side BEFORE INSERT ON inventory_transactions
BEGIN
    SELECT CASE
        WHEN new.transaction_type IN ('SALE', 'OUT')
             AND (new.quantity_boxes != '0' OR new.quantity_items != '0' OR new.quantity_subitems != '0') THEN
            RAISE(ABORT, 'Outgoing entries cannot carry incoming quantities')
        WHEN new.transaction_type IN ('PUR', 'RET', 'IN')
             AND (new.quantity_boxes_out != '0' OR new.quantity_items_out != '0' OR new.quantity_subitems_out != '0') THEN
            RAISE(ABORT, 'Incoming entries cannot carry outgoing quantities')
    END;
END;

CREATE TRIGGER IF NOT EXISTS inventory_transactions_no_update BEFORE UPDATE ON inventory_transactions
BEGIN
    SELECT RAISE(ABORT, 'Ledger entries are immutable');
END;

CREATE TRIGGER IF NOT EXISTS inventory_transactions_no_delete BEFORE DELETE ON inventory_transactions
BEGIN
    SELECT RAISE(ABORT, 'Ledger entries are immutable');
END;

CREATE INDEX IF NOT EXISTS idx_txn_product ON inventory_transactions(product_id);
CREATE INDEX IF NOT EXISTS idx_txn_batch ON inventory_transactions(batch_id);
CREATE INDEX IF NOT EXISTS idx_txn_created ON inventory_transactions(created_at);

CREATE TRIGGER IF NOT EXISTS distributor_purchases_no_update BEFORE UPDATE ON distributor_purchases
BEGIN
    SELECT RAISE(ABORT, 'Distributor purchases are immutable');
END;

CREATE TRIGGER IF NOT EXISTS distributor_payments_no_update BEFORE UPDATE ON distributor_payments
BEGIN
    SELECT RAISE(ABORT, 'Distributor payments are immutable');
END;

-- ============================================================================
-- Checkout & Returns
-- ============================================================================

CREATE TABLE IF NOT EXISTS pharmacy_sales (
    id TEXT PRIMARY KEY,
    bill_number TEXT NOT NULL UNIQUE,
    patient_ref_no TEXT,
    customer_name TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    discount_amount TEXT NOT NULL,
    final_amount TEXT NOT NULL,
    is_direct_sale INTEGER NOT NULL DEFAULT 0,
    sale_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pharmacy_sale_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sale_id TEXT NOT NULL REFERENCES pharmacy_sales(id),
    product_id TEXT NOT NULL REFERENCES products(id),
    product_name TEXT NOT NULL,
    batch_id TEXT REFERENCES product_batches(id),
    quantity TEXT NOT NULL,                      -- JSON Quantities (normalized)
    unit_price TEXT NOT NULL,
    line_total TEXT NOT NULL,
    transaction_id TEXT NOT NULL REFERENCES inventory_transactions(id)
);

CREATE TABLE IF NOT EXISTS medicine_returns (
    id TEXT PRIMARY KEY,
    return_number TEXT NOT NULL UNIQUE,
    original_bill_number TEXT,
    customer_name TEXT NOT NULL,
    reason TEXT NOT NULL,
    reason_detail TEXT,
    total_refund TEXT NOT NULL,
    return_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS medicine_return_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    return_id TEXT NOT NULL REFERENCES medicine_returns(id),
    product_id TEXT NOT NULL REFERENCES products(id),
    product_name TEXT NOT NULL,
    batch_id TEXT REFERENCES product_batches(id),
    quantity TEXT NOT NULL,                      -- JSON Quantities (normalized)
    unit_price TEXT NOT NULL,
    refund_amount TEXT NOT NULL,
    transaction_id TEXT NOT NULL REFERENCES inventory_transactions(id)
);

CREATE INDEX IF NOT EXISTS idx_sales_date ON pharmacy_sales(sale_date);
CREATE INDEX IF NOT EXISTS idx_returns_date ON medicine_returns(return_date);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            r#"INSERT INTO products (id, name, medicine_form, products_in_box, items_per_product,
                                    subitems_per_item, pricing, created_at, updated_at)
               VALUES ('p1', 'Test', 'tablet', 1, 10, 10, '{}', 'now', 'now')"#,
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
        // Idempotent on reopen
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_factor_constraint() {
        let conn = setup();
        let result = conn.execute(
            r#"INSERT INTO products (id, name, medicine_form, products_in_box, items_per_product,
                                    subitems_per_item, pricing, created_at, updated_at)
               VALUES ('p2', 'Bad', 'tablet', 1, 0, 10, '{}', 'now', 'now')"#,
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_ledger_side_constraint() {
        let conn = setup();

        // Sale with incoming quantity should fail
        let result = conn.execute(
            r#"INSERT INTO inventory_transactions (id, seq, product_id, transaction_type, quantity_subitems, created_at)
               VALUES ('t1', 1, 'p1', 'SALE', '5', 'now')"#,
            [],
        );
        assert!(result.is_err());

        // Purchase with outgoing quantity should fail
        let result = conn.execute(
            r#"INSERT INTO inventory_transactions (id, seq, product_id, transaction_type, quantity_subitems_out, created_at)
               VALUES ('t1', 1, 'p1', 'PUR', '5', 'now')"#,
            [],
        );
        assert!(result.is_err());

        // Valid sale should succeed
        let result = conn.execute(
            r#"INSERT INTO inventory_transactions (id, seq, product_id, transaction_type, quantity_subitems_out, created_at)
               VALUES ('t1', 1, 'p1', 'SALE', '5', 'now')"#,
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_ledger_immutable() {
        let conn = setup();
        conn.execute(
            r#"INSERT INTO inventory_transactions (id, seq, product_id, transaction_type, quantity_subitems, created_at)
               VALUES ('t1', 1, 'p1', 'PUR', '100', 'now')"#,
            [],
        )
        .unwrap();

        let update = conn.execute(
            "UPDATE inventory_transactions SET quantity_subitems = '1' WHERE id = 't1'",
            [],
        );
        assert!(update.is_err());

        let delete = conn.execute("DELETE FROM inventory_transactions WHERE id = 't1'", []);
        assert!(delete.is_err());
    }
}
