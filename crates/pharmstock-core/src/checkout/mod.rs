//! Pharmacy checkout and customer returns.
//!
//! A bill (or return) and all of its ledger entries commit as one unit of
//! work: if any line fails, nothing is recorded.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::inventory::{Inventory, InventoryError, InventoryResult, Movement};
use crate::models::{
    document_number, new_id, now_timestamp, CheckoutRequest, MedicineReturn, PharmacySale, Product,
    Quantities, ReturnLine, ReturnRequest, SaleLine, SaleLineRequest, TransactionType,
    ValidationError,
};
use crate::pricing::{ensure_storable, round_currency, CURRENCY_DP};

const BILL_PREFIX: &str = "BILL";
const RETURN_PREFIX: &str = "RET";

/// Price of a line: pack price times the share of a pack sold.
fn line_amount(product: &Product, unit_price: Decimal, normalized: &Quantities) -> Decimal {
    product.unit_scheme().pack_value(unit_price, normalized)
}

fn validate_lines(lines: &[SaleLineRequest]) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::new("lines", "at least one line is required"));
    }
    Ok(())
}

impl<'a> Inventory<'a> {
    /// Sell every line on one bill numbered `BILL-YYYYMMDD-NNN`.
    pub fn checkout(&self, request: CheckoutRequest) -> InventoryResult<PharmacySale> {
        validate_lines(&request.lines)?;
        let customer_name = request.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(ValidationError::new("customer_name", "customer name is required").into());
        }
        let discount_amount = round_currency(request.discount_amount);
        if discount_amount < Decimal::ZERO {
            return Err(ValidationError::new("discount_amount", "cannot be negative").into());
        }

        self.db().atomic(|db| {
            let today = Utc::now().date_naive();
            let bill_number =
                document_number(BILL_PREFIX, today, db.next_document_sequence(BILL_PREFIX, today)?);

            let mut lines = Vec::with_capacity(request.lines.len());
            for line in &request.lines {
                let mut movement =
                    Movement::new(&line.product_id, TransactionType::Sale, line.quantity);
                movement.unit_price = line.unit_price;
                movement.batch_id = line.batch_id.as_deref();
                movement.notes = Some(format!("Bill {}", bill_number));

                let applied = self.apply_movement(&movement)?;
                let quantity = applied.entry.outgoing;
                let line_total =
                    line_amount(&applied.product, applied.entry.unit_sale_price, &quantity);
                lines.push(SaleLine {
                    product_id: applied.product.id,
                    product_name: applied.product.name,
                    batch_id: applied.entry.batch_id.clone(),
                    quantity,
                    unit_price: applied.entry.unit_sale_price,
                    line_total,
                    transaction_id: applied.entry.id,
                });
            }

            let total_amount: Decimal = lines.iter().map(|l| l.line_total).sum();
            if discount_amount > total_amount {
                return Err(ValidationError::new(
                    "discount_amount",
                    "discount exceeds the bill total",
                )
                .into());
            }
            ensure_storable("total_amount", total_amount, CURRENCY_DP)?;

            let sale = PharmacySale {
                id: new_id(),
                bill_number,
                patient_ref_no: request.patient_ref_no.clone(),
                customer_name: customer_name.clone(),
                total_amount,
                discount_amount,
                final_amount: total_amount - discount_amount,
                is_direct_sale: request.is_direct_sale,
                sale_date: now_timestamp(),
                lines,
            };
            db.insert_sale(&sale)?;

            info!(
                bill_number = %sale.bill_number,
                lines = sale.lines.len(),
                total = %sale.total_amount,
                final_amount = %sale.final_amount,
                "Checked out bill"
            );
            Ok(sale)
        })
    }

    /// Take back medicine, restoring stock, under a return numbered
    /// `RET-YYYYMMDD-NNN`.
    ///
    /// Lines without a price are refunded at the price on the original bill,
    /// else at the current sale price.
    pub fn process_return(&self, request: ReturnRequest) -> InventoryResult<MedicineReturn> {
        validate_lines(&request.lines)?;
        let customer_name = request.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(ValidationError::new("customer_name", "customer name is required").into());
        }

        self.db().atomic(|db| {
            let original = match &request.original_bill_number {
                Some(bill) => Some(
                    db.get_sale_by_bill_number(bill)?
                        .ok_or_else(|| InventoryError::not_found("bill", bill))?,
                ),
                None => None,
            };

            let today = Utc::now().date_naive();
            let return_number = document_number(
                RETURN_PREFIX,
                today,
                db.next_document_sequence(RETURN_PREFIX, today)?,
            );

            let mut lines = Vec::with_capacity(request.lines.len());
            for line in &request.lines {
                let billed = original.as_ref().and_then(|sale| {
                    sale.lines
                        .iter()
                        .find(|billed| billed.product_id == line.product_id)
                });
                let billed_price = billed.map(|b| b.unit_price);
                let batch_id = line
                    .batch_id
                    .clone()
                    .or_else(|| billed.and_then(|b| b.batch_id.clone()));

                let mut movement =
                    Movement::new(&line.product_id, TransactionType::Return, line.quantity);
                movement.unit_price = line.unit_price.or(billed_price);
                movement.batch_id = batch_id.as_deref();
                movement.notes = Some(format!("Return {} ({})", return_number, request.reason.as_str()));

                let applied = self.apply_movement(&movement)?;
                let quantity = applied.entry.incoming;
                let refund_amount =
                    line_amount(&applied.product, applied.entry.unit_sale_price, &quantity);
                lines.push(ReturnLine {
                    product_id: applied.product.id,
                    product_name: applied.product.name,
                    batch_id: applied.entry.batch_id.clone(),
                    quantity,
                    unit_price: applied.entry.unit_sale_price,
                    refund_amount,
                    transaction_id: applied.entry.id,
                });
            }

            let total_refund: Decimal = lines.iter().map(|l| l.refund_amount).sum();
            ensure_storable("total_refund", total_refund, CURRENCY_DP)?;

            let medicine_return = MedicineReturn {
                id: new_id(),
                return_number,
                original_bill_number: request.original_bill_number.clone(),
                customer_name: customer_name.clone(),
                reason: request.reason,
                reason_detail: request.reason_detail.clone(),
                total_refund,
                return_date: now_timestamp(),
                lines,
            };
            db.insert_return(&medicine_return)?;

            info!(
                return_number = %medicine_return.return_number,
                reason = medicine_return.reason.as_str(),
                refund = %medicine_return.total_refund,
                "Processed return"
            );
            Ok(medicine_return)
        })
    }
}
