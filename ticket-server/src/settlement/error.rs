//! Settlement errors

use crate::db::repository::RepoError;
use crate::seating::SeatStoreError;
use crate::settlement::storage::StorageError;
use crate::vouchers::VoucherError;
use shared::order::OrderStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("showtime not found: {0}")]
    ShowtimeNotFound(String),

    #[error("combo not found: {0}")]
    ComboNotFound(String),

    /// The hold does not exist, lapsed, or does not match the request
    #[error("hold invalid: {0}")]
    HoldInvalid(String),

    /// Wrong-state operation; the order stays untouched
    #[error("order is {found}, expected {expected}")]
    InvalidState {
        expected: OrderStatus,
        found: OrderStatus,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Voucher(#[from] VoucherError),

    #[error("seat store error: {0}")]
    Seats(#[from] SeatStoreError),

    #[error("order storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("catalog error: {0}")]
    Repo(#[from] RepoError),
}

pub type SettlementResult<T> = Result<T, SettlementError>;
