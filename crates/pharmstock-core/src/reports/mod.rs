//! Period summaries computed from the ledger.
//!
//! Amounts use the unit prices captured on each ledger entry, so later price
//! changes do not rewrite history. Rendering is left to the caller.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::db::Database;
use crate::inventory::InventoryResult;
use crate::models::{LedgerEntry, Quantities, TransactionType, ValidationError};
use crate::pricing::round_currency;
use crate::stock::UnitScheme;

/// Per-product figures for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub product_id: String,
    pub product_name: String,
    /// Normalized quantity sold
    pub units_sold: Quantities,
    pub revenue: Decimal,
    /// Purchase value of what was sold
    pub cost_of_goods: Decimal,
    pub units_returned: Quantities,
    /// Sale value refunded
    pub returned_value: Decimal,
    /// Purchase value of what came back
    pub returned_cost: Decimal,
    pub purchases_cost: Decimal,
    /// `(revenue − returned_value) − (cost_of_goods − returned_cost)`
    pub profit: Decimal,
}

impl ProductSummary {
    fn new(product_id: &str, product_name: String) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_name,
            units_sold: Quantities::zero(),
            revenue: Decimal::ZERO,
            cost_of_goods: Decimal::ZERO,
            units_returned: Quantities::zero(),
            returned_value: Decimal::ZERO,
            returned_cost: Decimal::ZERO,
            purchases_cost: Decimal::ZERO,
            profit: Decimal::ZERO,
        }
    }

    fn add(&mut self, entry: &LedgerEntry, scheme: Option<&dyn UnitScheme>) {
        let quantity = entry.quantity();
        let value = |pack_price: Decimal| match scheme {
            Some(scheme) => scheme.pack_value(pack_price, &quantity),
            None => round_currency(pack_price * quantity.boxes),
        };
        let at_sale = value(entry.unit_sale_price);
        let at_cost = value(entry.unit_purchase_price);
        match entry.txn_type {
            TransactionType::Sale => {
                self.units_sold += quantity;
                self.revenue += at_sale;
                self.cost_of_goods += at_cost;
            }
            TransactionType::Return => {
                self.units_returned += quantity;
                self.returned_value += at_sale;
                self.returned_cost += at_cost;
            }
            TransactionType::Purchase => self.purchases_cost += at_cost,
            TransactionType::Incoming | TransactionType::Outgoing => {}
        }
        self.profit =
            (self.revenue - self.returned_value) - (self.cost_of_goods - self.returned_cost);
    }
}

/// Totals over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Products with any movement, by name
    pub products: Vec<ProductSummary>,
    pub bills: usize,
    pub revenue: Decimal,
    pub cost_of_goods: Decimal,
    pub returned_value: Decimal,
    pub purchases_cost: Decimal,
    /// Flat discounts given on bills
    pub bill_discounts: Decimal,
    /// Product profit less bill discounts
    pub profit: Decimal,
}

/// One month inside a [`YearlyBalance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub month: u32,
    pub revenue: Decimal,
    pub profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyBalance {
    pub year: i32,
    pub summary: PeriodSummary,
    pub months: Vec<MonthlyTotal>,
    /// Outstanding distributor payables right now
    pub payables_due: Decimal,
}

/// Read-only reporting over one database.
pub struct Reports<'a> {
    db: &'a Database,
}

impl<'a> Reports<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Figures for every day from `from` through `to`.
    pub fn summarize_period(&self, from: NaiveDate, to: NaiveDate) -> InventoryResult<PeriodSummary> {
        if to < from {
            return Err(ValidationError::new("to", "period ends before it starts").into());
        }
        let start = day_start(from);
        let after = to
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| ValidationError::new("to", format!("date {} out of range", to)))?;
        let end = day_start(after);

        let catalog: HashMap<String, (String, Box<dyn UnitScheme>)> = self
            .db
            .list_products()?
            .into_iter()
            .map(|p| {
                let scheme = p.unit_scheme();
                (p.id, (p.name, scheme))
            })
            .collect();

        let mut by_product: BTreeMap<String, ProductSummary> = BTreeMap::new();
        let entries = self.db.ledger_entries_between(&start, &end)?;
        for entry in &entries {
            let known = catalog.get(&entry.product_id);
            by_product
                .entry(entry.product_id.clone())
                .or_insert_with(|| {
                    let name = known.map(|(name, _)| name.clone()).unwrap_or_default();
                    ProductSummary::new(&entry.product_id, name)
                })
                .add(entry, known.map(|(_, scheme)| scheme.as_ref()));
        }

        let sales = self.db.sales_between(&start, &end)?;
        let bill_discounts: Decimal = sales.iter().map(|s| s.discount_amount).sum();

        let mut products: Vec<ProductSummary> = by_product.into_values().collect();
        products.sort_by(|a, b| a.product_name.cmp(&b.product_name));

        let revenue = products.iter().map(|p| p.revenue).sum();
        let cost_of_goods = products.iter().map(|p| p.cost_of_goods).sum();
        let returned_value = products.iter().map(|p| p.returned_value).sum();
        let purchases_cost = products.iter().map(|p| p.purchases_cost).sum();
        let product_profit: Decimal = products.iter().map(|p| p.profit).sum();

        debug!(%from, %to, entries = entries.len(), bills = sales.len(), "Summarized period");
        Ok(PeriodSummary {
            from,
            to,
            products,
            bills: sales.len(),
            revenue,
            cost_of_goods,
            returned_value,
            purchases_cost,
            bill_discounts,
            profit: product_profit - bill_discounts,
        })
    }

    pub fn monthly_sales(&self, year: i32, month: u32) -> InventoryResult<PeriodSummary> {
        let (first, last) = month_bounds(year, month)?;
        self.summarize_period(first, last)
    }

    pub fn yearly_balance(&self, year: i32) -> InventoryResult<YearlyBalance> {
        let (first, _) = month_bounds(year, 1)?;
        let (_, last) = month_bounds(year, 12)?;
        let summary = self.summarize_period(first, last)?;

        let mut months = Vec::with_capacity(12);
        for month in 1..=12 {
            let monthly = self.monthly_sales(year, month)?;
            months.push(MonthlyTotal {
                month,
                revenue: monthly.revenue,
                profit: monthly.profit,
            });
        }

        let payables_due = self
            .db
            .list_distributors()?
            .iter()
            .map(|d| d.balance_due())
            .filter(|due| *due > Decimal::ZERO)
            .sum();

        Ok(YearlyBalance {
            year,
            summary,
            months,
            payables_due,
        })
    }
}

/// Midnight UTC of `date` in the ledger's timestamp format.
fn day_start(date: NaiveDate) -> String {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ValidationError::new("month", format!("no such month {}-{}", year, month)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ValidationError::new("year", format!("year {} out of range", year)))?;
    Ok((first, next - Duration::days(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use crate::distributors::{DistributorLedger, NewDistributor};
    use crate::inventory::Inventory;
    use crate::models::{
        CheckoutRequest, ConversionFactors, MedicineForm, NewProduct, ReturnReason, ReturnRequest,
        SaleLineRequest,
    };

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds(2024, 2).unwrap(),
            (
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
            )
        );
        assert_eq!(
            month_bounds(2025, 12).unwrap().1,
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        assert!(month_bounds(2025, 13).is_err());
    }

    #[test]
    fn test_day_start_sorts_with_ledger_timestamps() {
        let start = day_start(NaiveDate::from_ymd_opt(2026, 1, 18).unwrap());
        assert_eq!(start, "2026-01-18T00:00:00.000000Z");
    }

    #[test]
    fn test_summary_of_today() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        // Net 360 per pack, sold at 500
        let product = inventory
            .create_product_with_initial_stock(
                NewProduct::new(
                    "Panadol".into(),
                    MedicineForm::Tablet,
                    ConversionFactors::new(1, 10, 10).unwrap(),
                    dec(400),
                )
                .with_discount(crate::pricing::Discount::Amount(dec(40)))
                .with_sale_price(dec(500)),
                Decimal::ONE,
            )
            .unwrap();

        let mut request = CheckoutRequest::walk_in(vec![SaleLineRequest::new(
            product.id.clone(),
            Quantities::items(4),
        )]);
        request.discount_amount = dec(20);
        let sale = inventory.checkout(request).unwrap();
        inventory
            .process_return(ReturnRequest {
                customer_name: "Walk-in Customer".into(),
                original_bill_number: Some(sale.bill_number),
                reason: ReturnReason::Extra,
                reason_detail: None,
                lines: vec![SaleLineRequest::new(product.id.clone(), Quantities::items(1))],
            })
            .unwrap();

        let today = Utc::now().date_naive();
        let summary = Reports::new(&db).summarize_period(today, today).unwrap();
        assert_eq!(summary.bills, 1);
        assert_eq!(summary.products.len(), 1);

        let line = &summary.products[0];
        assert_eq!(line.units_sold.subitems, dec(40));
        assert_eq!(line.revenue, dec(200));
        assert_eq!(line.cost_of_goods, dec(144));
        assert_eq!(line.returned_value, dec(50));
        assert_eq!(line.returned_cost, dec(36));
        assert_eq!(line.purchases_cost, dec(360));
        // (200 − 50) − (144 − 36)
        assert_eq!(line.profit, dec(42));
        assert_eq!(summary.bill_discounts, dec(20));
        assert_eq!(summary.profit, dec(22));
    }

    #[test]
    fn test_yearly_balance_includes_payables() {
        let db = Database::open_in_memory().unwrap();
        let ledger = DistributorLedger::new(&db);
        let d = ledger
            .create_distributor(NewDistributor {
                name: "Medi Traders".into(),
                ..Default::default()
            })
            .unwrap();
        let today = Utc::now().date_naive();
        ledger
            .record_purchase(&d.id, dec(10_000), None, today, None)
            .unwrap();
        ledger
            .record_payment(&d.id, dec(4_000), today, None, None)
            .unwrap();

        let balance = Reports::new(&db).yearly_balance(today.year()).unwrap();
        assert_eq!(balance.months.len(), 12);
        assert_eq!(balance.payables_due, dec(6_000));
        assert_eq!(balance.summary.revenue, Decimal::ZERO);
    }

    #[test]
    fn test_reversed_period_rejected() {
        let db = Database::open_in_memory().unwrap();
        let reports = Reports::new(&db);
        let day = NaiveDate::from_ymd_opt(2026, 1, 18).unwrap();
        assert!(reports.summarize_period(day, day - Duration::days(1)).is_err());
    }

    #[test]
    fn test_period_ending_on_last_date_rejected() {
        let db = Database::open_in_memory().unwrap();
        let reports = Reports::new(&db);
        let err = reports
            .summarize_period(NaiveDate::MAX, NaiveDate::MAX)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::inventory::InventoryError::Validation(ref v) if v.field == "to"
        ));
    }

    #[test]
    fn test_summary_values_odd_pack_exactly() {
        let db = Database::open_in_memory().unwrap();
        let inventory = Inventory::new(&db);
        // 3 strips × 7 tablets, net 400, sold at 500
        let product = inventory
            .create_product_with_initial_stock(
                NewProduct::new(
                    "Augmentin".into(),
                    MedicineForm::Tablet,
                    ConversionFactors::new(1, 3, 7).unwrap(),
                    dec(400),
                )
                .with_sale_price(dec(500)),
                Decimal::ONE,
            )
            .unwrap();
        inventory
            .record_sale(&product.id, Quantities::subitems(11), None, None, false)
            .unwrap();

        let today = Utc::now().date_naive();
        let summary = Reports::new(&db).summarize_period(today, today).unwrap();
        let line = &summary.products[0];
        // 500 × 11 / 21 and 400 × 11 / 21
        assert_eq!(line.revenue, Decimal::new(26190, 2));
        assert_eq!(line.cost_of_goods, Decimal::new(20952, 2));
    }
}
