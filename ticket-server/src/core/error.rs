//! Server bootstrap errors

use thiserror::Error;

/// Errors surfaced by server startup and the run loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage initialization failed: {0}")]
    Storage(String),

    #[error("catalog database error: {0}")]
    Catalog(#[from] surrealdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
