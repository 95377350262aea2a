//! Order domain types
//!
//! An order is assembled once (seats + combos + optional voucher) into an
//! immutable priced snapshot, then settled exactly once by the payment
//! callback. Only the settlement fields ever change after assembly.

pub mod snapshot;
pub mod types;

// Re-exports
pub use snapshot::{OrderSnapshot, OrderStatus};
pub use types::*;
