//! Seat availability states shared between the store and the API layer.

use serde::{Deserialize, Serialize};

/// Per-(showtime, chair) availability state.
///
/// `HELD` carries a TTL lease; an expired lease reads as `FREE` without
/// anyone having to write the record back (lazy expiry).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    #[default]
    Free,
    Held,
    Sold,
}

impl std::fmt::Display for SeatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SeatState::Free => "FREE",
            SeatState::Held => "HELD",
            SeatState::Sold => "SOLD",
        };
        write!(f, "{}", s)
    }
}

/// Read-model view of one chair's availability record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChairStateView {
    pub chair_id: String,
    /// Effective state after lazy lease expiry
    pub state: SeatState,
    /// Optimistic-concurrency version of the underlying record
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_state_wire_form() {
        assert_eq!(serde_json::to_string(&SeatState::Held).unwrap(), "\"HELD\"");
        let back: SeatState = serde_json::from_str("\"SOLD\"").unwrap();
        assert_eq!(back, SeatState::Sold);
    }

    #[test]
    fn default_is_free() {
        assert_eq!(SeatState::default(), SeatState::Free);
    }
}
