//! 错误映射
//!
//! 将各子系统错误转换为 API 层的 [`AppError`]，集中维护
//! HTTP 状态与错误码的对应关系。

use crate::db::repository::RepoError;
use crate::seating::SeatStoreError;
use crate::settlement::{SettlementError, StorageError};
use crate::tickets::TicketError;
use crate::utils::AppError;
use crate::vouchers::VoucherError;

// ============ Seating ============

impl From<SeatStoreError> for AppError {
    fn from(err: SeatStoreError) -> Self {
        match err {
            SeatStoreError::SeatConflict { chairs } => {
                AppError::conflict(format!("chairs not available: {}", chairs.join(", ")))
            }
            SeatStoreError::HoldNotFound => AppError::not_found("hold not found"),
            SeatStoreError::HoldExpired => AppError::business_rule("hold expired"),
            SeatStoreError::EmptyHold => {
                AppError::validation("at least one chair must be selected")
            }
            other => AppError::database(other.to_string()),
        }
    }
}

// ============ Vouchers ============

impl From<VoucherError> for AppError {
    fn from(err: VoucherError) -> Self {
        match err {
            VoucherError::NotFound(code) => {
                AppError::not_found(format!("voucher {code} not found"))
            }
            VoucherError::NotYetActive(_) | VoucherError::Expired(_) => {
                AppError::business_rule(err.to_string())
            }
        }
    }
}

// ============ Catalog ============

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::not_found(msg),
            RepoError::Duplicate(msg) => AppError::conflict(msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}

// ============ Settlement ============

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::database(err.to_string())
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::OrderNotFound(id) => {
                AppError::not_found(format!("order {id} not found"))
            }
            SettlementError::ShowtimeNotFound(id) => {
                AppError::not_found(format!("showtime {id} not found"))
            }
            SettlementError::ComboNotFound(id) => {
                AppError::not_found(format!("combo {id} not found"))
            }
            SettlementError::HoldInvalid(msg) => {
                AppError::business_rule(format!("hold invalid: {msg}"))
            }
            SettlementError::InvalidState { expected, found } => {
                AppError::business_rule(format!("order is {found}, expected {expected}"))
            }
            SettlementError::InvalidAmount(msg) => AppError::validation(msg),
            SettlementError::Voucher(e) => e.into(),
            SettlementError::Seats(e) => e.into(),
            SettlementError::Storage(e) => e.into(),
            SettlementError::Repo(e) => e.into(),
        }
    }
}

// ============ Tickets ============

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::OrderNotFound(id) => {
                AppError::not_found(format!("order {id} not found"))
            }
            TicketError::OrderNotCompleted(status) => {
                AppError::business_rule(format!("order is {status}, not completed"))
            }
            TicketError::InvalidSignature => AppError::validation("qr payload invalid"),
            TicketError::TicketNotFound => AppError::not_found("no ticket issued for this order"),
            TicketError::Superseded => {
                AppError::business_rule("ticket superseded by a re-issue")
            }
            TicketError::AlreadyUsed => AppError::conflict("ticket already used"),
            TicketError::Encoding(e) => AppError::internal(e.to_string()),
            TicketError::Storage(e) => e.into(),
        }
    }
}
