//! # rowbind
//!
//! Map typed records to and from rows of legacy Excel (`.xls`) worksheets.
//!
//! A record type describes its fields once in a [`FieldTable`]. A field
//! spec then lines field names up with sheet columns, and [`RowMapper`]
//! does the rest:
//!
//! - reading turns each stored row into a default-constructed record,
//!   converting cell text to the field's type
//! - writing emits a bold header row followed by one text row per record,
//!   either into a file (appending a sheet when the file already exists),
//!   an HTTP download or any [`std::io::Write`]
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rowbind::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     name: String,
//!     birth_date: Option<NaiveDate>,
//! }
//!
//! impl Record for Person {
//!     fn fields() -> FieldTable<Self> {
//!         FieldTable::new()
//!             .field("name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
//!             .field(
//!                 "birth_date",
//!                 |p: &Person| &p.birth_date,
//!                 |p: &mut Person| &mut p.birth_date,
//!             )
//!     }
//! }
//!
//! let people = vec![Person {
//!     name: "Li".into(),
//!     birth_date: NaiveDate::from_ymd_opt(2020, 1, 1),
//! }];
//! let spec = [Some("name"), None, Some("birth_date")];
//!
//! let mapper = RowMapper::detached();
//! let mut bytes = Vec::new();
//! mapper.write_to(&people, &spec, &["Name", "BirthDate"], "People", &mut bytes)?;
//!
//! // written columns are packed, so read them back without the gap
//! let packed = [Some("name"), Some("birth_date")];
//! let back: Vec<Person> = mapper.read_from(std::io::Cursor::new(bytes), &packed, 0, true)?;
//! assert_eq!(back, people);
//! # Ok::<(), rowbind::MapError>(())
//! ```

pub mod coerce;
pub mod columns;
pub mod date;
pub mod error;
pub mod mapper;
pub mod options;
pub mod prelude;
pub mod record;
pub mod sink;

pub use columns::{ColumnMap, MappedColumn};
pub use error::{CoerceError, MapError, Result};
pub use mapper::{RowMapper, TextRows};
pub use options::{MapperOptions, DEFAULT_SKIP_MARKER};
pub use record::{FieldAccessor, FieldKind, FieldTable, FieldType, FieldValue, Record};
pub use sink::{BufferedResponse, DownloadResponse, DOWNLOAD_CONTENT_TYPE};

// Workbook model and codec, for callers that need more than rows
pub use rowbind_core::{CellValue, Workbook, Worksheet};
pub use rowbind_xls::{XlsError, XlsReader, XlsWriter};
