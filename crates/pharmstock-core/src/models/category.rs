//! Product category model.

use serde::{Deserialize, Serialize};

/// A named grouping of products (e.g. "Analgesics").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: i64,
    pub name: String,
}
