//! Error types for the session core.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while driving a screening session.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("device error: {0}")]
    Device(String),

    #[error("NLU oracle error: {0}")]
    Oracle(String),

    #[error("printer error: {0}")]
    Printer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
