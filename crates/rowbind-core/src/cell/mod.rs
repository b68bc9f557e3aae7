//! Cell values, addresses and sparse storage

mod address;
mod storage;
mod value;

pub use address::{CellAddress, CellRange};
pub use storage::{CellData, CellStorage};
pub use value::{format_number, CellError, CellValue, SharedString};
