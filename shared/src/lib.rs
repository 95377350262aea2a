//! Shared types for the cinema ticketing engine
//!
//! Common types used across the server crates and integration tests:
//! order snapshots and their priced lines, seat availability states,
//! ticket payloads, and time helpers.

pub mod order;
pub mod seating;
pub mod ticket;
pub mod util;

// Re-exports
pub use order::{FailureReason, OrderSnapshot, OrderStatus, PaymentAttempt};
pub use seating::{ChairStateView, SeatState};
pub use serde::{Deserialize, Serialize};
