//! Pharmacy bill and customer return models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Quantities;

/// A checked-out pharmacy bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacySale {
    pub id: String,
    /// Daily sequence number, e.g. `BILL-20260118-001`
    pub bill_number: String,
    pub patient_ref_no: Option<String>,
    pub customer_name: String,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    /// Sold over the counter, not against a prescription
    pub is_direct_sale: bool,
    pub sale_date: String,
    pub lines: Vec<SaleLine>,
}

/// One medicine on a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub product_name: String,
    pub batch_id: Option<String>,
    /// Normalized quantity sold
    pub quantity: Quantities,
    /// Price of one pack
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Ledger entry written for this line
    pub transaction_id: String,
}

/// Requested line for a checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: Quantities,
    /// Price of one pack; defaults to the batch or product sale price
    pub unit_price: Option<Decimal>,
    /// Explicit batch, bypassing FEFO
    pub batch_id: Option<String>,
}

impl SaleLineRequest {
    pub fn new(product_id: String, quantity: Quantities) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: None,
            batch_id: None,
        }
    }
}

/// Who the bill is for and how it is settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_name: String,
    pub patient_ref_no: Option<String>,
    pub is_direct_sale: bool,
    /// Flat discount off the bill total
    pub discount_amount: Decimal,
    pub lines: Vec<SaleLineRequest>,
}

impl CheckoutRequest {
    pub fn walk_in(lines: Vec<SaleLineRequest>) -> Self {
        Self {
            customer_name: "Walk-in Customer".into(),
            patient_ref_no: None,
            is_direct_sale: true,
            discount_amount: Decimal::ZERO,
            lines,
        }
    }
}

/// Why a customer brought medicine back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    WrongMedicine,
    Expired,
    Damaged,
    Allergy,
    DoctorChanged,
    Extra,
    Other,
}

impl ReturnReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnReason::WrongMedicine => "wrong_medicine",
            ReturnReason::Expired => "expired",
            ReturnReason::Damaged => "damaged",
            ReturnReason::Allergy => "allergy",
            ReturnReason::DoctorChanged => "doctor_changed",
            ReturnReason::Extra => "extra",
            ReturnReason::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "wrong_medicine" => Some(ReturnReason::WrongMedicine),
            "expired" => Some(ReturnReason::Expired),
            "damaged" => Some(ReturnReason::Damaged),
            "allergy" => Some(ReturnReason::Allergy),
            "doctor_changed" => Some(ReturnReason::DoctorChanged),
            "extra" => Some(ReturnReason::Extra),
            "other" => Some(ReturnReason::Other),
            _ => None,
        }
    }
}

/// A processed customer return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineReturn {
    pub id: String,
    /// Daily sequence number, e.g. `RET-20260118-001`
    pub return_number: String,
    pub original_bill_number: Option<String>,
    pub customer_name: String,
    pub reason: ReturnReason,
    pub reason_detail: Option<String>,
    pub total_refund: Decimal,
    pub return_date: String,
    pub lines: Vec<ReturnLine>,
}

/// One medicine brought back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub product_id: String,
    pub product_name: String,
    pub batch_id: Option<String>,
    pub quantity: Quantities,
    pub unit_price: Decimal,
    pub refund_amount: Decimal,
    pub transaction_id: String,
}

/// Requested return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub customer_name: String,
    pub original_bill_number: Option<String>,
    pub reason: ReturnReason,
    pub reason_detail: Option<String>,
    pub lines: Vec<SaleLineRequest>,
}

/// `PREFIX-YYYYMMDD-NNN`
pub fn document_number(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:03}", prefix, date.format("%Y%m%d"), sequence)
}
