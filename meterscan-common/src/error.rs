//! Common error types for meterscan

use thiserror::Error;

/// Common result type for meterscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the meterscan crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid field value on a measure or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Measure was already confirmed; confirmation is one-shot
    #[error("Measure already confirmed: {0}")]
    AlreadyConfirmed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
