//! Validated column-to-field mapping

use rowbind_core::{Error as CoreError, MAX_COLS};

use crate::error::{MapError, Result};
use crate::options::MapperOptions;
use crate::record::{FieldAccessor, Record};

/// One mapped field
#[derive(Debug, Clone)]
pub struct MappedColumn<R> {
    /// Column read from, the position of the name in the field spec
    pub source: u16,
    /// Column written to; mapped fields are packed from column 0
    pub output: u16,
    pub accessor: FieldAccessor<R>,
}

/// Field spec entries that survived skipping, resolved against a record's
/// field table. Built once, before any row is touched.
#[derive(Debug, Clone)]
pub struct ColumnMap<R> {
    columns: Vec<MappedColumn<R>>,
}

impl<R: Record> ColumnMap<R> {
    /// Resolve a field spec. `None` entries and the skip marker are dropped;
    /// any other name must exist on `R`.
    pub fn build<S: AsRef<str>>(spec: &[Option<S>], options: &MapperOptions) -> Result<Self> {
        let table = R::fields();
        let mut columns = Vec::with_capacity(spec.len());

        for (position, entry) in spec.iter().enumerate() {
            let Some(entry) = entry else {
                continue;
            };
            let name: &str = entry.as_ref();
            if options.is_skipped(name) {
                continue;
            }
            if position >= MAX_COLS as usize {
                return Err(CoreError::ColumnOutOfBounds(
                    position.min(u16::MAX as usize) as u16,
                    MAX_COLS - 1,
                )
                .into());
            }
            let accessor = table.get(name).ok_or_else(|| MapError::UnknownField {
                field: name.to_string(),
                record: std::any::type_name::<R>(),
            })?;
            columns.push(MappedColumn {
                source: position as u16,
                output: columns.len() as u16,
                accessor: accessor.clone(),
            });
        }

        Ok(Self { columns })
    }
}

impl<R> ColumnMap<R> {
    pub fn iter(&self) -> impl Iterator<Item = &MappedColumn<R>> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
