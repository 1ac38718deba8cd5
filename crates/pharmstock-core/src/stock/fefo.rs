//! First-expiry-first-out batch ordering.

use std::cmp::Ordering;

use crate::models::ProductBatch;

/// Earliest expiry first, undated batches last, receipt order on ties.
pub fn fefo_cmp(a: &ProductBatch, b: &ProductBatch) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry.then_with(|| a.received_seq.cmp(&b.received_seq))
}

/// Batches that can still be sold from, in consumption order.
pub fn fefo_order(batches: Vec<ProductBatch>) -> Vec<ProductBatch> {
    let mut sellable: Vec<ProductBatch> = batches
        .into_iter()
        .filter(|batch| batch.is_active && !batch.current.subitems.is_zero())
        .collect();
    sellable.sort_by(fefo_cmp);
    sellable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quantities, StockLevel};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn batch(id: &str, expiry: Option<(i32, u32, u32)>, seq: i64, stock: i64) -> ProductBatch {
        ProductBatch {
            id: id.into(),
            product_id: "p1".into(),
            distributor_id: None,
            batch_no: id.to_uppercase(),
            expiry_date: expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            initial: Quantities::subitems(stock),
            current: StockLevel {
                boxes: Decimal::ZERO,
                items: Decimal::from(stock),
                subitems: Decimal::from(stock),
            },
            stock_deficit: Decimal::ZERO,
            purchase_price_per_pack: None,
            sale_price_per_pack: None,
            is_active: stock > 0,
            received_seq: seq,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_nulls_last() {
        let ordered = fefo_order(vec![
            batch("a", Some((2025, 1, 1)), 1, 10),
            batch("b", Some((2024, 6, 1)), 2, 10),
            batch("c", None, 3, 10),
        ]);
        let ids: Vec<_> = ordered.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_receipt_order_breaks_ties() {
        let ordered = fefo_order(vec![
            batch("late", Some((2025, 3, 1)), 9, 5),
            batch("early", Some((2025, 3, 1)), 4, 5),
        ]);
        assert_eq!(ordered[0].id, "early");
    }

    #[test]
    fn test_empty_batches_skipped() {
        let ordered = fefo_order(vec![
            batch("empty", Some((2024, 1, 1)), 1, 0),
            batch("full", Some((2026, 1, 1)), 2, 5),
        ]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].id, "full");
    }
}
