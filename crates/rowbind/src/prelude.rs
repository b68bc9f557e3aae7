//! Common imports for rowbind users
//!
//! ```rust
//! use rowbind::prelude::*;
//! ```

pub use crate::{
    BufferedResponse, CoerceError, DownloadResponse, FieldKind, FieldTable, FieldType,
    FieldValue, MapError, MapperOptions, Record, Result, RowMapper,
};
