//! Entry-ticket DTOs shared between the ticket service and the API layer.

use crate::order::OrderStatus;
use serde::{Deserialize, Serialize};

/// A freshly issued (or re-issued) QR ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedTicket {
    pub order_id: String,
    /// Signed compact payload; this exact string goes into the QR code
    pub qr_content: String,
    /// Issue timestamp (ms)
    pub issued_at: i64,
    /// Signature validity horizon (ms)
    pub expires_at: i64,
}

/// Outcome of a successful ticket verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketVerification {
    pub order_id: String,
    /// Whether this call consumed the ticket
    pub marked_used: bool,
    /// Order state after the call
    pub order_status: OrderStatus,
    /// Issue timestamp of the verified payload (ms)
    pub issued_at: i64,
}
