//! The row mapper

use std::fs::OpenOptions;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use rowbind_core::{check_sheet_name, Style, Workbook, Worksheet};
use rowbind_xls::{XlsAppender, XlsError, XlsReader, XlsWriter};

use crate::coerce;
use crate::columns::{ColumnMap, MappedColumn};
use crate::date;
use crate::error::{CoerceError, MapError, Result};
use crate::options::MapperOptions;
use crate::record::{FieldValue, Record};
use crate::sink::{attachment_disposition, DownloadResponse, DOWNLOAD_CONTENT_TYPE};

/// Textual rows of a sheet: row index and one entry per column
pub type TextRows = Vec<(u32, Vec<Option<String>>)>;

/// Reads records from and writes records to `.xls` worksheets.
///
/// A mapper holds a workbook path and [`MapperOptions`]; every operation is
/// a single pass that opens the file, does its work and releases it.
#[derive(Debug, Clone, Default)]
pub struct RowMapper {
    path: Option<PathBuf>,
    options: MapperOptions,
}

impl RowMapper {
    /// Mapper bound to a workbook file
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            options: MapperOptions::default(),
        }
    }

    /// Mapper without a file, for [`write_to`](Self::write_to),
    /// [`write_download`](Self::write_download) and [`read_from`](Self::read_from)
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: MapperOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    fn require_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(MapError::NoFile)
    }

    fn open_workbook(&self) -> Result<Workbook> {
        let path = self.require_path()?;
        XlsReader::read_file(path).map_err(|source| MapError::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    // === Reading ===

    /// Read the records of the sheet at `sheet_index`.
    ///
    /// `spec` lists field names by column; `None` entries and the skip
    /// marker leave their column unread. With `has_title` the first row of
    /// the sheet is treated as a header and skipped.
    pub fn read<R, S>(
        &self,
        spec: &[Option<S>],
        sheet_index: usize,
        has_title: bool,
    ) -> Result<Vec<R>>
    where
        R: Record,
        S: AsRef<str>,
    {
        let workbook = self.open_workbook()?;
        self.map_rows(&workbook, spec, sheet_index, has_title)
    }

    /// Like [`read`](Self::read), from an in-memory or already open workbook
    pub fn read_from<R, S, Src>(
        &self,
        source: Src,
        spec: &[Option<S>],
        sheet_index: usize,
        has_title: bool,
    ) -> Result<Vec<R>>
    where
        R: Record,
        S: AsRef<str>,
        Src: Read + Seek,
    {
        let workbook = XlsReader::read(source)?;
        self.map_rows(&workbook, spec, sheet_index, has_title)
    }

    /// Cell texts of every stored row, without mapping them to records.
    ///
    /// Each row spans columns `0..=last used column` of the sheet; absent
    /// cells are `None`.
    pub fn read_rows(&self, sheet_index: usize, has_title: bool) -> Result<TextRows> {
        let workbook = self.open_workbook()?;
        let sheet = sheet_at(&workbook, sheet_index)?;
        let date_1904 = workbook.settings().date_1904;

        let Some(range) = sheet.used_range() else {
            return Ok(Vec::new());
        };
        let first = range.start.row + u32::from(has_title);
        let rows = (first..=range.end.row)
            .filter(|&row| sheet.row_exists(row))
            .map(|row| {
                let cells = (0..=range.end.col)
                    .map(|col| sheet.cell_text(row, col, date_1904))
                    .collect();
                (row, cells)
            })
            .collect();
        Ok(rows)
    }

    /// Names of all sheets in the workbook, in order
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.open_workbook()?.sheet_names())
    }

    fn map_rows<R, S>(
        &self,
        workbook: &Workbook,
        spec: &[Option<S>],
        sheet_index: usize,
        has_title: bool,
    ) -> Result<Vec<R>>
    where
        R: Record,
        S: AsRef<str>,
    {
        let columns = ColumnMap::<R>::build(spec, &self.options)?;
        let sheet = sheet_at(workbook, sheet_index)?;
        let date_1904 = workbook.settings().date_1904;

        let Some(range) = sheet.used_range() else {
            log::debug!("Sheet '{}' is empty", sheet.name());
            return Ok(Vec::new());
        };

        let first = range.start.row + u32::from(has_title);
        let mut records = Vec::new();
        for row in first..=range.end.row {
            if !sheet.row_exists(row) {
                continue;
            }
            let mut record = R::default();
            for column in columns.iter() {
                let Some(text) = sheet.cell_text(row, column.source, date_1904) else {
                    continue;
                };
                self.assign(&mut record, column, &text, date_1904)
                    .map_err(|source| coerce_error(row, column.source, column, source))?;
            }
            records.push(record);
        }

        log::debug!(
            "Mapped {} records from sheet '{}' (rows {}..={})",
            records.len(),
            sheet.name(),
            first,
            range.end.row
        );
        Ok(records)
    }

    fn assign<R>(
        &self,
        record: &mut R,
        column: &MappedColumn<R>,
        text: &str,
        date_1904: bool,
    ) -> std::result::Result<(), CoerceError> {
        let kind = column.accessor.kind();
        let value = if kind.is_date() {
            date::parse_date(text, kind, &self.options, date_1904)?
        } else {
            coerce::parse_value(text, kind, &self.options)?
        };
        column.accessor.set(record, value)
    }

    // === Writing ===

    /// Write the records as a new sheet of the mapper's file.
    ///
    /// A non-empty existing file gets the sheet appended after its last
    /// one; the rest of the file is kept as it is. An absent or empty file
    /// becomes a new one-sheet workbook. The file is opened once.
    pub fn write_file<R, S, T>(
        &self,
        records: &[R],
        spec: &[Option<S>],
        titles: &[T],
        sheet_name: &str,
    ) -> Result<()>
    where
        R: Record,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let path = self.require_path()?;
        let sheet = self.build_sheet(records, spec, titles, sheet_name)?;

        let open_error = |source: XlsError| MapError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| open_error(e.into()))?;

        if file.metadata()?.len() > 0 {
            let appender = XlsAppender::open(&mut file).map_err(open_error)?;
            log::info!(
                "Appending sheet '{}' to {} ({} existing sheets)",
                sheet_name,
                path.display(),
                appender.sheet_names().len()
            );
            appender.append(&sheet).map_err(xls_error)?;
        } else {
            let mut workbook = Workbook::empty();
            workbook.add_existing_worksheet(sheet)?;
            serialize(&workbook, &mut file)?;
        }
        file.flush()?;

        log::debug!(
            "Wrote {} records to sheet '{}' of {}",
            records.len(),
            sheet_name,
            path.display()
        );
        Ok(())
    }

    /// Stream the records as a one-sheet workbook download.
    ///
    /// The response is reset, then marked as an attachment named
    /// `file_name`.
    pub fn write_download<D, R, S, T>(
        &self,
        response: &mut D,
        file_name: &str,
        records: &[R],
        spec: &[Option<S>],
        titles: &[T],
        sheet_name: &str,
    ) -> Result<()>
    where
        D: DownloadResponse + ?Sized,
        R: Record,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let workbook = self.single_sheet_workbook(records, spec, titles, sheet_name)?;

        response.reset();
        response.set_content_type(DOWNLOAD_CONTENT_TYPE)?;
        response.set_header("Content-Disposition", &attachment_disposition(file_name))?;
        serialize(&workbook, response.body())
    }

    /// Serialize the records as a one-sheet workbook into any writer
    pub fn write_to<R, S, T, W>(
        &self,
        records: &[R],
        spec: &[Option<S>],
        titles: &[T],
        sheet_name: &str,
        sink: W,
    ) -> Result<()>
    where
        R: Record,
        S: AsRef<str>,
        T: AsRef<str>,
        W: Write,
    {
        let workbook = self.single_sheet_workbook(records, spec, titles, sheet_name)?;
        serialize(&workbook, sink)
    }

    fn single_sheet_workbook<R, S, T>(
        &self,
        records: &[R],
        spec: &[Option<S>],
        titles: &[T],
        sheet_name: &str,
    ) -> Result<Workbook>
    where
        R: Record,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut workbook = Workbook::empty();
        workbook.add_existing_worksheet(self.build_sheet(records, spec, titles, sheet_name)?)?;
        Ok(workbook)
    }

    /// Header row of bold wrapped titles, then one row per record
    fn build_sheet<R, S, T>(
        &self,
        records: &[R],
        spec: &[Option<S>],
        titles: &[T],
        sheet_name: &str,
    ) -> Result<Worksheet>
    where
        R: Record,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        check_sheet_name(sheet_name)?;
        let columns = ColumnMap::<R>::build(spec, &self.options)?;
        if titles.len() != columns.len() {
            return Err(MapError::TitleMismatch {
                titles: titles.len(),
                columns: columns.len(),
            });
        }

        let mut sheet = Worksheet::new(sheet_name);
        let header = Style::new().bold(true).wrap_text(true);
        for (col, title) in titles.iter().enumerate() {
            let col = col as u16;
            let title = title.as_ref();
            sheet.set_cell_value_at(0, col, title)?;
            sheet.set_cell_style_at(0, col, &header)?;
            if let Some(width) = self.header_width(title) {
                sheet.set_column_width(col, width);
            }
        }

        for (i, record) in records.iter().enumerate() {
            let row = u32::try_from(i + 1).unwrap_or(u32::MAX);
            for column in columns.iter() {
                let text = self
                    .render(&column.accessor.get(record), column)
                    .map_err(|source| coerce_error(row, column.output, column, source))?;
                sheet.set_cell_value_at(row, column.output, text)?;
            }
        }
        Ok(sheet)
    }

    fn render<R>(
        &self,
        value: &FieldValue,
        column: &MappedColumn<R>,
    ) -> std::result::Result<String, CoerceError> {
        if column.accessor.kind().is_date() {
            date::format_date(value, &self.options)
        } else {
            Ok(coerce::render_value(value))
        }
    }

    /// Column width in characters for a title, capped at 255.
    /// Empty titles keep the default width.
    fn header_width(&self, title: &str) -> Option<f64> {
        let chars = title.chars().count() as u64;
        if chars == 0 {
            return None;
        }
        let units = chars * u64::from(self.options.width_per_char);
        Some((units as f64 / 256.0).min(255.0))
    }
}

/// The one place a workbook becomes bytes
fn serialize<W: Write>(workbook: &Workbook, sink: W) -> Result<()> {
    XlsWriter::write(workbook, sink)?;
    Ok(())
}

/// Model errors raised inside the XLS layer, such as a taken sheet name,
/// surface as [`MapError::Core`]
fn xls_error(error: XlsError) -> MapError {
    match error {
        XlsError::Core(e) => MapError::Core(e),
        other => MapError::Xls(other),
    }
}

fn sheet_at(workbook: &Workbook, index: usize) -> Result<&Worksheet> {
    workbook.worksheet(index).ok_or(MapError::SheetNotFound {
        index,
        count: workbook.sheet_count(),
    })
}

fn coerce_error<R>(
    row: u32,
    column: u16,
    mapped: &MappedColumn<R>,
    source: CoerceError,
) -> MapError {
    MapError::Coerce {
        row,
        column,
        field: mapped.accessor.name().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldTable;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rowbind_core::CellValue;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Person {
        name: String,
        birth_date: Option<NaiveDate>,
        score: f64,
    }

    impl Record for Person {
        fn fields() -> FieldTable<Self> {
            FieldTable::new()
                .field("name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
                .field(
                    "birth_date",
                    |p: &Person| &p.birth_date,
                    |p: &mut Person| &mut p.birth_date,
                )
                .field("score", |p: &Person| &p.score, |p: &mut Person| &mut p.score)
        }
    }

    fn li() -> Person {
        Person {
            name: "Li".into(),
            birth_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            score: 9.5,
        }
    }

    #[test]
    fn test_mapper_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RowMapper>();
    }

    #[test]
    fn test_build_sheet_layout() {
        let mapper = RowMapper::detached();
        let spec = [Some("name"), None, Some("birth_date")];
        let sheet = mapper
            .build_sheet(&[li()], &spec, &["Name", "BirthDate"], "People")
            .unwrap();

        assert_eq!(sheet.name(), "People");
        assert_eq!(sheet.get_value_at(0, 0).as_text(), Some("Name"));
        assert_eq!(sheet.get_value_at(0, 1).as_text(), Some("BirthDate"));
        assert_eq!(sheet.get_value_at(1, 0).as_text(), Some("Li"));
        assert_eq!(sheet.get_value_at(1, 1).as_text(), Some("2020-01-01"));
        assert!(sheet.get_value_at(1, 2).is_empty());

        let header = sheet.cell_style_at(0, 0).unwrap();
        assert!(header.font.bold);
        assert!(header.alignment.wrap_text);
        assert_eq!(sheet.column_width(0), 4.0 * 1000.0 / 256.0);
        assert_eq!(sheet.column_width(1), 9.0 * 1000.0 / 256.0);
    }

    #[test]
    fn test_none_renders_empty_string() {
        let mapper = RowMapper::detached();
        let nobody = Person {
            birth_date: None,
            ..li()
        };
        let sheet = mapper
            .build_sheet(&[nobody], &[Some("birth_date")], &["Born"], "S")
            .unwrap();
        assert_eq!(sheet.get_value_at(1, 0), CellValue::text(""));
    }

    #[test]
    fn test_title_mismatch() {
        let mapper = RowMapper::detached();
        let err = mapper
            .build_sheet(&[li()], &[Some("name"), Some("score")], &["Name"], "S")
            .unwrap_err();
        assert!(matches!(
            err,
            MapError::TitleMismatch {
                titles: 1,
                columns: 2
            }
        ));
    }

    #[test]
    fn test_header_width_is_capped() {
        let mapper = RowMapper::detached();
        assert_eq!(mapper.header_width(""), None);
        assert_eq!(mapper.header_width(&"x".repeat(100)), Some(255.0));
    }

    #[test]
    fn test_invalid_sheet_name_fails_before_any_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xls");
        let mapper = RowMapper::new(&path);

        let err = mapper
            .write_file(&[li()], &[Some("name")], &["Name"], "a/b")
            .unwrap_err();
        assert!(matches!(
            err,
            MapError::Core(rowbind_core::Error::InvalidSheetName(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_operations_need_a_path() {
        let mapper = RowMapper::detached();
        assert!(matches!(mapper.sheet_names(), Err(MapError::NoFile)));
        let err = mapper
            .write_file(&[li()], &[Some("name")], &["Name"], "S")
            .unwrap_err();
        assert!(matches!(err, MapError::NoFile));
    }
}
