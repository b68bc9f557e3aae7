//! XLS (BIFF8) writer.
//!
//! Lays out the workbook globals (fonts, formats, XFs, sheet directory and
//! shared strings) followed by one substream per worksheet, then wraps the
//! stream in a Compound File Binary container.
//!
//! Formula cells are written as their cached value; formula text is not
//! preserved. To add a sheet to an existing file without rewriting what is
//! already there, see [`XlsAppender`](crate::XlsAppender).

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;

use rowbind_core::{CellValue, Workbook, Worksheet};

use crate::biff::parser::encode_rk;
use crate::biff::records;
use crate::biff::strings::{char_count, write_short_string};
use crate::biff::writer::BiffWriter;
use crate::error::{XlsError, XlsResult};
use crate::styles::{StyleTable, DEFAULT_CELL_XF};

/// Streams shorter than this are padded; some readers reject workbooks
/// stored in the CFB mini-stream.
pub(crate) const MIN_STREAM_SIZE: usize = 4096;
const ROW_BLOCK: usize = 32;
const MERGES_PER_RECORD: usize = 1027;
const MAX_CELL_CHARS: usize = 32_767;
/// Default row height in twips (12.75pt)
const DEFAULT_ROW_TWIPS: u16 = 255;

/// XLS file writer.
pub struct XlsWriter;

impl XlsWriter {
    /// Write a workbook to a new or truncated file.
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsResult<()> {
        let bytes = Self::write_to_vec(workbook)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Write a workbook into any writer.
    pub fn write<W: Write>(workbook: &Workbook, mut writer: W) -> XlsResult<()> {
        let bytes = Self::write_to_vec(workbook)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize a workbook to the bytes of an `.xls` file.
    pub fn write_to_vec(workbook: &Workbook) -> XlsResult<Vec<u8>> {
        let stream = Self::workbook_stream(workbook)?;

        // version 3 (512-byte sectors) is what Excel writes and other readers expect
        let mut cfb =
            cfb::CompoundFile::create_with_version(cfb::Version::V3, Cursor::new(Vec::new()))?;
        {
            let mut out = cfb.create_stream("/Workbook")?;
            out.write_all(&stream)?;
        }
        cfb.flush()?;
        Ok(cfb.into_inner().into_inner())
    }

    /// Build the raw BIFF8 `Workbook` stream.
    pub fn workbook_stream(workbook: &Workbook) -> XlsResult<Vec<u8>> {
        if workbook.is_empty() {
            return Err(XlsError::Write("a workbook needs at least one sheet".into()));
        }

        let mut styles = StyleTable::new();
        let mut strings = SharedStrings::default();
        let mut xf_maps = Vec::with_capacity(workbook.sheet_count());
        for ws in workbook.worksheets() {
            xf_maps.push(Self::collect_sheet(ws, &mut styles, &mut strings)?);
        }

        let mut w = BiffWriter::new();
        let patches = Self::write_globals(&mut w, workbook, &styles, &strings);
        let sheets = workbook.worksheets().zip(&xf_maps).zip(patches);
        for (idx, ((ws, xf_map), patch_at)) in sheets.enumerate() {
            let bof_pos = w.position() as u32;
            w.patch_u32(patch_at, bof_pos);
            Self::write_sheet(&mut w, ws, xf_map, &strings, idx == workbook.active_sheet());
        }

        w.pad_to(MIN_STREAM_SIZE);
        let stream = w.into_inner();
        log::debug!(
            "built Workbook stream: {} bytes, {} sheets, {} shared strings",
            stream.len(),
            workbook.sheet_count(),
            strings.unique.len()
        );
        Ok(stream)
    }

    /// Register a sheet's styles and strings. Returns style index -> XF index.
    pub(crate) fn collect_sheet(
        ws: &Worksheet,
        styles: &mut StyleTable,
        strings: &mut SharedStrings,
    ) -> XlsResult<HashMap<u32, u16>> {
        let mut xf_map = HashMap::new();
        for (row, col, cell) in ws.iter_cells() {
            if let Entry::Vacant(slot) = xf_map.entry(cell.style_index) {
                let xf = match ws.style_by_index(cell.style_index) {
                    Some(style) => styles.xf_index(style)?,
                    None => DEFAULT_CELL_XF,
                };
                slot.insert(xf);
            }
            if let CellValue::Text(s) = cell.value.effective_value() {
                if char_count(s.as_str()) > MAX_CELL_CHARS {
                    return Err(XlsError::Write(format!(
                        "cell {} in '{}' holds more than {MAX_CELL_CHARS} characters",
                        rowbind_core::CellAddress::new(row, col),
                        ws.name()
                    )));
                }
                strings.intern(s.as_str());
            }
        }
        Ok(xf_map)
    }

    /// Globals substream. Returns the offsets of the BOUNDSHEET position fields.
    fn write_globals(
        w: &mut BiffWriter,
        workbook: &Workbook,
        styles: &StyleTable,
        strings: &SharedStrings,
    ) -> Vec<usize> {
        w.record(records::BOF, &bof_body(records::BOF_WORKBOOK_GLOBALS));
        w.record(records::CODEPAGE, &records::CODEPAGE_UTF16.to_le_bytes());

        let active = workbook.active_sheet() as u16;
        let mut window1 = Vec::with_capacity(18);
        for v in [0u16, 0, 0x3000, 0x1E00, 0x0038, active, 0, 1, 0x0258] {
            window1.extend_from_slice(&v.to_le_bytes());
        }
        w.record(records::WINDOW1, &window1);

        let date_mode: u16 = if workbook.settings().date_1904 { 1 } else { 0 };
        w.record(records::DATEMODE, &date_mode.to_le_bytes());

        styles.write_records(w);

        let mut patches = Vec::with_capacity(workbook.sheet_count());
        for ws in workbook.worksheets() {
            let mut body = Vec::with_capacity(8 + ws.name().len() * 2);
            body.extend_from_slice(&0u32.to_le_bytes());
            body.push(if ws.is_visible() { 0 } else { 1 });
            body.push(0);
            write_short_string(&mut body, ws.name());
            patches.push(w.position() + 4);
            w.record(records::BOUNDSHEET, &body);
        }

        w.sst(strings.total, &strings.unique);
        w.record(records::EOF, &[]);
        patches
    }

    /// One worksheet substream. Text missing from `strings` is written
    /// inline as LABEL records.
    pub(crate) fn write_sheet(
        w: &mut BiffWriter,
        ws: &Worksheet,
        xf_map: &HashMap<u32, u16>,
        strings: &SharedStrings,
        active: bool,
    ) {
        w.record(records::BOF, &bof_body(records::BOF_WORKSHEET));
        w.record(records::WSBOOL, &0x04C1u16.to_le_bytes());

        Self::write_columns(w, ws);
        w.record(records::DIMENSION, &dimension_body(ws));

        let mut rows: Vec<u32> = ws
            .row_indices()
            .chain(ws.custom_row_heights().keys().copied())
            .chain(ws.hidden_rows().iter().copied())
            .collect();
        rows.sort_unstable();
        rows.dedup();

        for block in rows.chunks(ROW_BLOCK) {
            for &row in block {
                w.record(records::ROW, &row_body(ws, row));
            }
            for &row in block {
                for (col, cell) in ws.iter_row(row) {
                    let xf = xf_map.get(&cell.style_index).copied().unwrap_or(DEFAULT_CELL_XF);
                    write_cell(w, row as u16, col, xf, cell.value.effective_value(), strings);
                }
            }
        }

        let grbit: u16 = if active { 0x06B6 } else { 0x00B6 };
        let mut window2 = Vec::with_capacity(18);
        window2.extend_from_slice(&grbit.to_le_bytes());
        window2.extend_from_slice(&[0, 0, 0, 0]);
        window2.extend_from_slice(&0x40u32.to_le_bytes());
        window2.extend_from_slice(&[0; 8]);
        w.record(records::WINDOW2, &window2);

        for chunk in ws.merged_regions().chunks(MERGES_PER_RECORD) {
            let mut body = Vec::with_capacity(2 + chunk.len() * 8);
            body.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
            for range in chunk {
                body.extend_from_slice(&(range.start.row as u16).to_le_bytes());
                body.extend_from_slice(&(range.end.row as u16).to_le_bytes());
                body.extend_from_slice(&range.start.col.to_le_bytes());
                body.extend_from_slice(&range.end.col.to_le_bytes());
            }
            w.record(records::MERGECELLS, &body);
        }

        w.record(records::EOF, &[]);
    }

    /// One COLINFO per column with a custom width or hidden flag
    fn write_columns(w: &mut BiffWriter, ws: &Worksheet) {
        let mut cols: Vec<u16> = ws
            .custom_column_widths()
            .keys()
            .chain(ws.hidden_columns().iter())
            .copied()
            .collect();
        cols.sort_unstable();
        cols.dedup();

        for col in cols {
            let width = (ws.column_width(col) * 256.0).round().clamp(0.0, 255.0 * 256.0) as u16;
            let options: u16 = if ws.is_column_hidden(col) { 0x0001 } else { 0 };
            let mut body = Vec::with_capacity(12);
            for v in [col, col, width, DEFAULT_CELL_XF, options, 0] {
                body.extend_from_slice(&v.to_le_bytes());
            }
            w.record(records::COLINFO, &body);
        }
    }
}

/// Deduplicated SST contents plus the total number of references
#[derive(Debug, Default)]
pub(crate) struct SharedStrings {
    unique: Vec<String>,
    index: HashMap<String, u32>,
    total: u32,
}

impl SharedStrings {
    fn intern(&mut self, s: &str) -> u32 {
        self.total += 1;
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.unique.len() as u32;
        self.unique.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    fn get(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }
}

fn bof_body(substream: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    for v in [records::BIFF8_VERSION, substream, 0x0DBB, 0x07CC] {
        body.extend_from_slice(&v.to_le_bytes());
    }
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&6u32.to_le_bytes());
    body
}

fn dimension_body(ws: &Worksheet) -> Vec<u8> {
    let mut body = Vec::with_capacity(14);
    let (first_row, last_row, first_col, last_col) = match ws.used_range() {
        Some(range) => (
            range.start.row,
            range.end.row + 1,
            range.start.col,
            range.end.col + 1,
        ),
        None => (0, 0, 0, 0),
    };
    body.extend_from_slice(&first_row.to_le_bytes());
    body.extend_from_slice(&last_row.to_le_bytes());
    body.extend_from_slice(&first_col.to_le_bytes());
    body.extend_from_slice(&last_col.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body
}

fn row_body(ws: &Worksheet, row: u32) -> Vec<u8> {
    let mut cols = ws.iter_row(row).map(|(col, _)| col);
    let first_col = cols.next().unwrap_or(0);
    let last_col = cols.last().unwrap_or(first_col);
    let (first_col, end_col) = if ws.row_exists(row) {
        (first_col, last_col + 1)
    } else {
        (0, 0)
    };

    let custom = ws.custom_row_heights().contains_key(&row);
    let height = if custom {
        (ws.row_height(row) * 20.0).round().clamp(1.0, 8192.0) as u16
    } else {
        DEFAULT_ROW_TWIPS
    };

    let mut options: u32 = 0x0100 | ((DEFAULT_CELL_XF as u32) << 16);
    if ws.is_row_hidden(row) {
        options |= 0x20;
    }
    if custom {
        options |= 0x40;
    }

    let mut body = Vec::with_capacity(16);
    for v in [row as u16, first_col, end_col, height, 0, 0] {
        body.extend_from_slice(&v.to_le_bytes());
    }
    body.extend_from_slice(&options.to_le_bytes());
    body
}

fn write_cell(
    w: &mut BiffWriter,
    row: u16,
    col: u16,
    xf: u16,
    value: &CellValue,
    strings: &SharedStrings,
) {
    let mut body = Vec::with_capacity(14);
    body.extend_from_slice(&row.to_le_bytes());
    body.extend_from_slice(&col.to_le_bytes());
    body.extend_from_slice(&xf.to_le_bytes());

    let record_type = match value {
        CellValue::Number(n) => match encode_rk(*n) {
            Some(rk) => {
                body.extend_from_slice(&rk.to_le_bytes());
                records::RK
            }
            None => {
                body.extend_from_slice(&n.to_le_bytes());
                records::NUMBER
            }
        },
        CellValue::Text(s) => match strings.get(s.as_str()) {
            Some(idx) => {
                body.extend_from_slice(&idx.to_le_bytes());
                records::LABELSST
            }
            None => {
                w.label(row, col, xf, s.as_str());
                return;
            }
        },
        CellValue::Boolean(b) => {
            body.extend_from_slice(&[*b as u8, 0]);
            records::BOOLERR
        }
        CellValue::Error(e) => {
            body.extend_from_slice(&[e.code(), 1]);
            records::BOOLERR
        }
        // styled cells without a value, and formulas without a cached result
        CellValue::Empty | CellValue::Formula { .. } => records::BLANK,
    };
    w.record(record_type, &body);
}
