//! # rowbind-core
//!
//! In-memory workbook model used by the rowbind BIFF8 codec and row mapper.
//!
//! - [`CellValue`] - what a cell holds (number, text, boolean, error, cached formula)
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing
//! - [`Style`] - the subset of cell formatting that survives a `.xls` round trip
//! - [`Workbook`], [`Worksheet`] - the document structures
//! - [`serial`] - conversion between spreadsheet date serials and `chrono` values
//!
//! ## Example
//!
//! ```rust
//! use rowbind_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", "Name").unwrap();
//! sheet.set_cell_value_at(1, 0, CellValue::text("Li")).unwrap();
//!
//! assert_eq!(sheet.cell_text(1, 0, false).as_deref(), Some("Li"));
//! ```

pub mod cell;
pub mod error;
pub mod serial;
pub mod style;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellData, CellError, CellRange, CellValue, SharedString};
pub use error::{Error, Result};
pub use style::{
    Alignment, FontStyle, HorizontalAlignment, NumberFormat, Style, StylePool, Underline,
    VerticalAlignment,
};
pub use workbook::{check_sheet_name, Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Number of rows a BIFF8 worksheet can address
pub const MAX_ROWS: u32 = 65_536;

/// Number of columns a BIFF8 worksheet can address
pub const MAX_COLS: u16 = 256;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
