//! XLS error types

use thiserror::Error;

/// Result type for XLS operations
pub type XlsResult<T> = std::result::Result<T, XlsError>;

/// Errors that can occur during XLS reading/writing
#[derive(Debug, Error)]
pub enum XlsError {
    /// IO error (also covers CFB errors which use std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Not a CFB container, or no BIFF8 workbook stream inside it
    #[error("Invalid XLS format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported XLS version: {0}")]
    UnsupportedVersion(String),

    /// A record body is truncated or malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The workbook cannot be expressed in BIFF8
    #[error("Cannot write XLS: {0}")]
    Write(String),

    #[error("Core error: {0}")]
    Core(#[from] rowbind_core::Error),
}
