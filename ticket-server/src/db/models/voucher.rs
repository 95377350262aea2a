//! Voucher Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Voucher entity (优惠码)
///
/// Read-only at runtime. Valid within the closed interval
/// `[start_at, end_at]`; the discount is
/// `min(floor(total * rate), max_value, total)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// Code as entered by the customer (exact match)
    pub code: String,
    /// Discount rate in (0, 1]
    pub rate: f64,
    /// Absolute cap on the granted discount
    pub max_value: f64,
    /// Window start (ms, inclusive)
    pub start_at: i64,
    /// Window end (ms, inclusive)
    pub end_at: i64,
}

/// Create voucher payload (seeding only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherCreate {
    pub code: String,
    pub rate: f64,
    pub max_value: f64,
    pub start_at: i64,
    pub end_at: i64,
}
