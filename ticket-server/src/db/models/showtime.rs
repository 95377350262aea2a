//! Showtime Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Showtime entity (场次)
///
/// Immutable once scheduled as far as this service is concerned; seat
/// availability hangs off `(showtime, chair)` pairs, not off this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub movie_title: String,
    /// Room reference; chairs of this room are sellable for the showtime
    #[serde(with = "serde_helpers::record_id")]
    pub room: RecordId,
    /// Start (ms since epoch)
    pub starts_at: i64,
    /// End (ms since epoch)
    pub ends_at: i64,
}

impl Showtime {
    pub fn id_string(&self) -> String {
        self.id.as_ref().map(|id| id.to_string()).unwrap_or_default()
    }
}

/// Create showtime payload (seeding only; no admin surface)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowtimeCreate {
    pub movie_title: String,
    #[serde(with = "serde_helpers::record_id")]
    pub room: RecordId,
    pub starts_at: i64,
    pub ends_at: i64,
}
