//! # rowbind-xls
//!
//! XLS (BIFF8) reader and writer for rowbind.
//!
//! Workbooks live in the `Workbook` stream of a Compound File Binary
//! container. [`XlsReader`] loads one into a [`rowbind_core::Workbook`];
//! [`XlsWriter`] serializes a workbook back out. [`XlsAppender`] adds a
//! sheet to an existing file and leaves everything else in it as it was.
//!
//! ```no_run
//! use rowbind_xls::{XlsReader, XlsWriter};
//!
//! let mut workbook = XlsReader::read_file("people.xls")?;
//! workbook.add_worksheet_with_name("Export")?;
//! XlsWriter::write_file(&workbook, "people.xls")?;
//! # Ok::<(), rowbind_xls::XlsError>(())
//! ```

mod append;
pub mod biff;
pub mod error;
pub mod reader;
mod styles;
pub mod writer;

pub use append::XlsAppender;
pub use error::{XlsError, XlsResult};
pub use reader::XlsReader;
pub use writer::XlsWriter;
