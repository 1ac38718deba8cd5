//! Domain models for the pharmacy inventory engine.

mod batch;
mod category;
mod distributor;
mod product;
mod sale;
mod transaction;
mod units;

pub use batch::*;
pub use category::*;
pub use distributor::*;
pub use product::*;
pub use sale::*;
pub use transaction::*;
pub use units::*;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

/// Rejected caller input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field
    pub field: &'static str,
    /// Human readable reason
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Current UTC time as a fixed-width RFC 3339 string.
///
/// Fixed width keeps lexical order equal to chronological order in SQL.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fresh random identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
