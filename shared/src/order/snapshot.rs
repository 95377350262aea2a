//! Order snapshot - the persisted, priced state of one order
//!
//! Written once at assembly time with every line priced; settlement then
//! drives `status` through `PENDING -> {COMPLETED, FAILED, CANCELED}` and
//! `COMPLETED -> PRINTED`, touching only the settlement fields.

use super::types::{AppliedVoucher, ComboLine, FailureReason, SeatLine};
use crate::util::now_millis;
use serde::{Deserialize, Serialize};

/// Order lifecycle state. Doubles as the settlement idempotency token:
/// every mutation re-checks the persisted value inside its own write
/// transaction before applying a transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Awaiting the payment callback
    #[default]
    Pending,
    /// Paid and seats confirmed
    Completed,
    /// Ticket consumed at the door
    Printed,
    /// Abandoned by the customer before payment
    Canceled,
    /// Settled unsuccessfully (see `failure_reason`)
    Failed,
}

impl OrderStatus {
    /// Terminal states accept no further settlement callbacks.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Printed => "PRINTED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Complete persisted order state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSnapshot {
    /// Order id (uuid)
    pub order_id: String,
    /// Showtime the seats belong to
    pub showtime_id: String,
    /// Seat hold backing this order; confirmed or released at settlement
    pub hold_token: String,
    /// Lifecycle state
    #[serde(default)]
    pub status: OrderStatus,
    /// Reserved chairs, priced at assembly
    pub seats: Vec<SeatLine>,
    /// Concession combos, priced at assembly
    pub combos: Vec<ComboLine>,
    /// Voucher application, when one was accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher: Option<AppliedVoucher>,
    /// Sum of seat prices and combo line totals
    pub total_price: f64,
    /// Granted voucher discount (0 when none)
    pub discount_price: f64,
    /// `max(0, total_price - discount_price)` - what the gateway must collect
    pub payment_price: f64,
    /// Why settlement failed, for `FAILED` orders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    /// Gateway transaction reference from the successful callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_txn_no: Option<String>,
    /// Assembly timestamp (ms)
    pub created_at: i64,
    /// Last settlement mutation timestamp (ms)
    pub updated_at: i64,
    /// Set when the order reached `COMPLETED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Set when the ticket was consumed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printed_at: Option<i64>,
}

impl OrderSnapshot {
    /// Fresh `PENDING` snapshot; the caller fills lines and prices.
    pub fn new(
        order_id: impl Into<String>,
        showtime_id: impl Into<String>,
        hold_token: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            order_id: order_id.into(),
            showtime_id: showtime_id.into(),
            hold_token: hold_token.into(),
            status: OrderStatus::Pending,
            seats: Vec::new(),
            combos: Vec::new(),
            voucher: None,
            total_price: 0.0,
            discount_price: 0.0,
            payment_price: 0.0,
            failure_reason: None,
            gateway_txn_no: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            printed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// Human-readable one-liner used as the gateway order description.
    pub fn summary(&self) -> String {
        format!(
            "{} seat(s), {} combo(s), showtime {}",
            self.seats.len(),
            self.combos.len(),
            self.showtime_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_starts_pending_with_zero_prices() {
        let snap = OrderSnapshot::new("o-1", "showtime:1", "hold-1");
        assert!(snap.is_pending());
        assert!(!snap.status.is_terminal());
        assert_eq!(snap.total_price, 0.0);
        assert_eq!(snap.payment_price, 0.0);
        assert!(snap.voucher.is_none());
        assert!(snap.completed_at.is_none());
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        let back: OrderStatus = serde_json::from_str("\"PRINTED\"").unwrap();
        assert_eq!(back, OrderStatus::Printed);
    }

    #[test]
    fn every_non_pending_status_is_terminal() {
        for s in [
            OrderStatus::Completed,
            OrderStatus::Printed,
            OrderStatus::Canceled,
            OrderStatus::Failed,
        ] {
            assert!(s.is_terminal(), "{} should be terminal", s);
        }
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn none_fields_are_omitted_from_json() {
        let snap = OrderSnapshot::new("o-1", "showtime:1", "hold-1");
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("failure_reason"));
        assert!(!json.contains("gateway_txn_no"));
        assert!(!json.contains("printed_at"));
    }
}
