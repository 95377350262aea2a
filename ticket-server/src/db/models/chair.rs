//! Chair Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use shared::order::SeatClass;
use surrealdb::RecordId;

/// Chair entity (座位)
///
/// The catalog price by class is resolved here at order assembly and
/// frozen into the order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chair {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// Display name, e.g. `A1`
    pub name: String,
    /// Room reference
    #[serde(with = "serde_helpers::record_id")]
    pub room: RecordId,
    /// Pricing class
    #[serde(default)]
    pub class: SeatClass,
    /// Current catalog price for this chair
    pub price: f64,
    #[serde(
        default = "default_true",
        deserialize_with = "serde_helpers::bool_true"
    )]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Chair {
    pub fn id_string(&self) -> String {
        self.id.as_ref().map(|id| id.to_string()).unwrap_or_default()
    }
}

/// Create chair payload (seeding only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChairCreate {
    pub name: String,
    #[serde(with = "serde_helpers::record_id")]
    pub room: RecordId,
    pub class: SeatClass,
    pub price: f64,
}
