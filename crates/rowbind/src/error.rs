//! Error types for the row mapper

use std::path::PathBuf;

use rowbind_core::CellAddress;
use rowbind_xls::XlsError;
use thiserror::Error;

use crate::record::FieldKind;

/// Result type alias using [`MapError`]
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors raised while mapping records to or from a worksheet
#[derive(Debug, Error)]
pub enum MapError {
    /// The source workbook could not be opened or parsed
    #[error("Cannot open workbook '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: XlsError,
    },

    /// A file operation was requested on a mapper built without a path
    #[error("No workbook file configured")]
    NoFile,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLS error: {0}")]
    Xls(#[from] XlsError),

    #[error("Workbook error: {0}")]
    Core(#[from] rowbind_core::Error),

    #[error("Sheet index {index} not found (workbook has {count} sheets)")]
    SheetNotFound { index: usize, count: usize },

    /// The field spec names a field the record type does not expose
    #[error("Record type {record} has no field named '{field}'")]
    UnknownField { field: String, record: &'static str },

    #[error("{titles} titles given for {columns} mapped columns")]
    TitleMismatch { titles: usize, columns: usize },

    #[error("Cell {} (field '{field}'): {source}", CellAddress::new(*row, *column))]
    Coerce {
        row: u32,
        column: u16,
        field: String,
        #[source]
        source: CoerceError,
    },

    /// A response header value was rejected
    #[error("Invalid header {name}: {message}")]
    Header { name: String, message: String },
}

/// Why a cell text could not become a field value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoerceError {
    #[error("'{text}' is not a valid {kind}")]
    InvalidNumber { text: String, kind: FieldKind },

    #[error("'{0}' is not a boolean")]
    InvalidBool(String),

    #[error("'{0}' does not match any accepted date pattern")]
    InvalidDate(String),

    /// A date pattern that chrono cannot format with
    #[error("Invalid date pattern '{0}'")]
    InvalidPattern(String),

    /// Blank cell text for a field that cannot be empty
    #[error("Value is required")]
    Missing,

    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("Expected a {expected} value, found {found}")]
    KindMismatch {
        expected: FieldKind,
        found: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_error_names_the_cell() {
        let err = MapError::Coerce {
            row: 2,
            column: 1,
            field: "age".into(),
            source: CoerceError::InvalidNumber {
                text: "abc".into(),
                kind: FieldKind::Integer,
            },
        };
        assert_eq!(
            err.to_string(),
            "Cell B3 (field 'age'): 'abc' is not a valid integer"
        );
    }

    #[test]
    fn test_open_error_names_the_file() {
        let err = MapError::Open {
            path: PathBuf::from("missing.xls"),
            source: XlsError::InvalidFormat("not a compound file".into()),
        };
        assert!(err.to_string().contains("missing.xls"));
    }
}
