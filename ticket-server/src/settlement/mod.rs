//! Order assembly and settlement.

pub mod assembler;
pub mod coordinator;
pub mod error;
pub mod money;
pub mod reconciliation;
pub mod storage;

pub use coordinator::{CallbackOutcome, ComboSelection, CreateOrderRequest, SettlementCoordinator};
pub use error::{SettlementError, SettlementResult};
pub use reconciliation::ReconciliationReporter;
pub use storage::{OrderStorage, StorageError};
