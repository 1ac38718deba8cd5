//! Multi-station tests: several connections writing one on-disk database.

use std::collections::HashSet;
use std::path::Path;
use std::thread;
use std::time::Duration;

use pharmstock_core::db::Database;
use pharmstock_core::inventory::{Inventory, InventoryError};
use pharmstock_core::models::{
    CheckoutRequest, ConversionFactors, MedicineForm, NewProduct, Quantities, SaleLineRequest,
};
use rust_decimal::Decimal;

const STATIONS: usize = 2;

fn station(path: &Path) -> Database {
    Database::open_with_timeout(path, Duration::from_secs(10)).unwrap()
}

fn stocked_product(db: &Database, boxes: i64) -> String {
    Inventory::new(db)
        .create_product_with_initial_stock(
            NewProduct::new(
                "Brufen".into(),
                MedicineForm::Tablet,
                ConversionFactors::new(1, 10, 10).unwrap(),
                Decimal::from(300),
            )
            .with_sale_price(Decimal::from(350)),
            Decimal::from(boxes),
        )
        .unwrap()
        .id
}

#[test]
fn test_concurrent_sales_never_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pharmacy.db");
    let product_id = stocked_product(&station(&path), 1);

    let handles: Vec<_> = (0..STATIONS)
        .map(|_| {
            let path = path.clone();
            let product_id = product_id.clone();
            thread::spawn(move || {
                let db = station(&path);
                let inventory = Inventory::new(&db);
                let mut sold = 0;
                for _ in 0..8 {
                    match inventory.record_sale(&product_id, Quantities::subitems(10), None, None, false) {
                        Ok(_) => sold += 1,
                        Err(InventoryError::InsufficientStock { .. }) => {}
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
                sold
            })
        })
        .collect();

    let sold: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(sold, 10);

    let db = station(&path);
    let inventory = Inventory::new(&db);
    let stock = inventory.get_stock(&product_id).unwrap();
    assert_eq!(stock.level.subitems, Decimal::ZERO);
    assert_eq!(stock.deficit, Decimal::ZERO);
    assert_eq!(inventory.list_transactions(&product_id, 100).unwrap().len(), 11);

    let report = inventory.recompute_product(&product_id).unwrap();
    assert!(!report.drifted());
}

#[test]
fn test_bill_numbers_unique_across_stations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pharmacy.db");
    let product_id = stocked_product(&station(&path), 5);

    let handles: Vec<_> = (0..STATIONS)
        .map(|_| {
            let path = path.clone();
            let product_id = product_id.clone();
            thread::spawn(move || {
                let db = station(&path);
                let inventory = Inventory::new(&db);
                (0..5)
                    .map(|_| {
                        inventory
                            .checkout(CheckoutRequest::walk_in(vec![SaleLineRequest::new(
                                product_id.clone(),
                                Quantities::items(1),
                            )]))
                            .unwrap()
                            .bill_number
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let bills: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<&String> = bills.iter().collect();
    assert_eq!(bills.len(), 10);
    assert_eq!(unique.len(), 10);

    let db = station(&path);
    let stock = Inventory::new(&db).get_stock(&product_id).unwrap();
    assert_eq!(stock.level.subitems, Decimal::from(400));
}
