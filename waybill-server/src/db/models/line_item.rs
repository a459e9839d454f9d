//! Line Item Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Line item row; belongs to exactly one order and is replaced wholesale
/// whenever that order's snapshot merges (unless protected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub order_id: String,
    pub sku_id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    pub quantity_unit: Option<String>,
    pub transacted_quantity: Option<i64>,
    pub transaction_status: Option<String>,
    pub created_at: DateTime<Utc>,
}
