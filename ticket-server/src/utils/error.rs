//! Application error types and uniform response envelope
//!
//! Every REST response (except the gateway callback, which speaks the
//! gateway's own body format) is an `AppResponse<T>` with a stable code:
//!
//! | Code  | Meaning              | HTTP |
//! |-------|----------------------|------|
//! | E0000 | Success              | 200  |
//! | E0002 | Validation failed    | 400  |
//! | E0003 | Resource not found   | 404  |
//! | E0004 | Conflict             | 409  |
//! | E0005 | Business rule        | 422  |
//! | E9001 | Internal error       | 500  |
//! | E9002 | Database error       | 500  |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-level error. Handlers return this; the `IntoResponse`
/// impl maps it onto the envelope.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested resource does not exist (unknown showtime, order,
    /// voucher, ticket, ...)
    #[error("not found: {0}")]
    NotFound(String),

    /// Lost a race on shared state (seat already taken, ticket already
    /// used, order already settled). Recoverable: re-read and retry a
    /// DIFFERENT request, never the same one blindly.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input, rejected before any state was touched
    #[error("validation failed: {0}")]
    Validation(String),

    /// Well-formed request that the domain rules refuse in the current
    /// state (cancel a non-pending order, ticket for an unpaid order,
    /// voucher outside its window, ...)
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// Storage layer failure
    #[error("database error: {0}")]
    Database(String),

    /// Anything unexpected
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        AppError::BusinessRule(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        AppError::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Stable machine-readable code for the envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "E0002",
            AppError::NotFound(_) => "E0003",
            AppError::Conflict(_) => "E0004",
            AppError::BusinessRule(_) => "E0005",
            AppError::Internal(_) => "E9001",
            AppError::Database(_) => "E9002",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // 5xx details stay in the log; the client gets a trace id instead.
        let (message, trace_id) = if status.is_server_error() {
            let trace_id = uuid::Uuid::new_v4().to_string();
            match &self {
                AppError::Database(msg) => {
                    error!(target: "database", error = %msg, trace_id = %trace_id, "database failure");
                }
                other => {
                    error!(error = %other, trace_id = %trace_id, "internal failure");
                }
            }
            ("internal server error".to_string(), Some(trace_id))
        } else {
            (self.to_string(), None)
        };

        let body = AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
            trace_id,
        };
        (status, Json(body)).into_response()
    }
}

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct AppResponse<T> {
    /// `E0000` on success, an error code otherwise
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl<T: Serialize> AppResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: "E0000".to_string(),
            message: "Success".to_string(),
            data: Some(data),
            trace_id: None,
        })
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: "E0000".to_string(),
            message: message.into(),
            data: Some(data),
            trace_id: None,
        })
    }
}

/// Handler result alias.
pub type AppResult<T> = Result<T, AppError>;
