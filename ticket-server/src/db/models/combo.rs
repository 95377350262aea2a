//! Concession Combo Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Concession combo entity (套餐)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combo {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current catalog price per unit
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

impl Combo {
    pub fn id_string(&self) -> String {
        self.id.as_ref().map(|id| id.to_string()).unwrap_or_default()
    }
}

/// Create combo payload (seeding only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboCreate {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
}
