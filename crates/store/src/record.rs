//! Row types shared between the store and its callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Alert audit entry, written once per alert after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub retailer: String,
    pub product_url: String,
    pub product_name: String,
    /// `price_drop`, `price_increase` or `stock_change`
    pub alert_type: String,
    pub severity: String,
    pub old_price: Option<f64>,
    pub new_price: Option<f64>,
    pub pct_change: Option<f64>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// High-level counts over the whole history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_records: i64,
    pub unique_products: i64,
    pub retailers_tracked: i64,
    pub earliest_observation: Option<DateTime<Utc>>,
    pub latest_observation: Option<DateTime<Utc>>,
    pub alerts_24h: i64,
}
