//! XLS (BIFF8) reader.
//!
//! Opens a Compound File Binary (CFB/OLE2) container, reads the `Workbook`
//! stream, parses BIFF8 records, and populates a `rowbind_core::Workbook`.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use rowbind_core::{CellAddress, CellError, CellRange, CellValue, Style, Workbook, Worksheet};

use crate::biff::parser::{read_bytes8, read_f64, read_rk, read_u16, read_u32, read_u8};
use crate::biff::records;
use crate::biff::strings::{parse_sst, read_continued_string, read_short_string, read_unicode_string};
use crate::biff::{self, BiffRecord};
use crate::error::{XlsError, XlsResult};
use crate::styles::{self, StyleContext};

/// XLS file reader.
pub struct XlsReader;

/// Metadata for a sheet parsed from the BOUNDSHEET record.
#[derive(Debug)]
struct SheetInfo {
    /// Absolute byte offset of the sheet's BOF in the Workbook stream.
    offset: u32,
    /// 0 = visible, 1 = hidden, 2 = very hidden.
    visibility: u8,
    /// 0 = worksheet, 2 = chart, 6 = macro/VBA.
    sheet_type: u8,
    name: String,
}

/// One BOF..EOF substream after the globals
struct SheetRecords<'a> {
    bof_offset: u64,
    records: Vec<&'a BiffRecord>,
}

impl XlsReader {
    /// Read an XLS file from a filesystem path.
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file)
    }

    /// Read an XLS file from any `Read + Seek` source.
    pub fn read<R: Read + Seek>(reader: R) -> XlsResult<Workbook> {
        let mut cfb = cfb::CompoundFile::open(reader)
            .map_err(|e| XlsError::InvalidFormat(format!("not a compound file: {e}")))?;

        // "Book" is the BIFF5 name, still used by some producers
        let stream_path = if cfb.exists("/Workbook") {
            "/Workbook"
        } else if cfb.exists("/Book") {
            "/Book"
        } else {
            return Err(XlsError::InvalidFormat(
                "no Workbook or Book stream found in CFB".into(),
            ));
        };

        let mut stream_data = Vec::new();
        {
            let mut stream = cfb.open_stream(stream_path)?;
            stream.read_to_end(&mut stream_data)?;
        }
        log::debug!("{stream_path} stream: {} bytes", stream_data.len());

        Self::read_stream(&stream_data)
    }

    /// Parse a raw BIFF8 workbook stream.
    pub fn read_stream(stream_data: &[u8]) -> XlsResult<Workbook> {
        let all_records = biff::read_all_records(&mut Cursor::new(stream_data))?;

        // Phase 1: workbook globals
        let mut sst: Vec<String> = Vec::new();
        let mut sheets: Vec<SheetInfo> = Vec::new();
        let mut date_mode_1904 = false;
        let mut in_globals = false;
        let mut globals_end_idx = None;
        let mut style_ctx = StyleContext::new();

        for (idx, rec) in all_records.iter().enumerate() {
            match rec.record_type {
                records::BOF if !in_globals => {
                    let (version, dt) = biff::parse_bof(&rec.data)?;
                    if dt != records::BOF_WORKBOOK_GLOBALS {
                        return Err(XlsError::InvalidFormat(format!(
                            "stream starts with substream type 0x{dt:04X}, expected workbook globals"
                        )));
                    }
                    if version != records::BIFF8_VERSION {
                        return Err(XlsError::UnsupportedVersion(format!(
                            "expected BIFF8 (0x0600), got 0x{version:04X}"
                        )));
                    }
                    in_globals = true;
                }
                _ if !in_globals => {}
                records::EOF => {
                    globals_end_idx = Some(idx);
                    break;
                }
                records::SST => sst = parse_sst(rec)?,
                records::BOUNDSHEET => sheets.push(Self::parse_boundsheet(&rec.data)?),
                records::DATEMODE => {
                    let mut off = 0;
                    date_mode_1904 = read_u16(&rec.data, &mut off)? == 1;
                }
                records::FONT => match styles::parse_font(&rec.data) {
                    Ok(font) => style_ctx.fonts.push(font),
                    Err(e) => log::warn!("skipping FONT record: {e}"),
                },
                records::FORMAT => match styles::parse_format(&rec.data) {
                    Ok((id, s)) => {
                        style_ctx.formats.insert(id, s);
                    }
                    Err(e) => log::warn!("skipping FORMAT record: {e}"),
                },
                records::XF => match styles::parse_xf(&rec.data) {
                    Ok(xf) => style_ctx.xfs.push(xf),
                    // keep XF numbering aligned with the file
                    Err(e) => {
                        log::warn!("unreadable XF record: {e}");
                        style_ctx.xfs.push(Default::default());
                    }
                },
                _ => {}
            }
        }

        let Some(globals_end_idx) = globals_end_idx else {
            return Err(XlsError::InvalidFormat(
                "no complete workbook globals substream found".into(),
            ));
        };

        let style_table = style_ctx.build_style_table();

        let mut workbook = Workbook::empty();
        workbook.settings_mut().date_1904 = date_mode_1904;

        // Phase 2: worksheet substreams, matched to BOUNDSHEET entries by
        // stream offset, falling back to file order
        let groups = Self::split_sheet_records(&all_records[globals_end_idx + 1..]);

        for (biff_idx, info) in sheets.iter().enumerate() {
            if info.sheet_type != 0 {
                log::debug!("skipping non-worksheet sheet '{}'", info.name);
                continue;
            }

            let mut ws = Worksheet::new(info.name.clone());
            ws.set_visible(info.visibility == 0);

            let group = groups
                .iter()
                .find(|g| g.bof_offset == info.offset as u64)
                .or_else(|| groups.get(biff_idx));
            match group {
                Some(group) => Self::parse_sheet_records(&group.records, &mut ws, &sst, &style_table)?,
                None => log::warn!("sheet '{}' has no substream", info.name),
            }

            workbook.add_existing_worksheet(ws)?;
        }

        log::debug!(
            "read workbook: {} sheets, {} shared strings",
            workbook.sheet_count(),
            sst.len()
        );
        Ok(workbook)
    }

    /// Parse a BOUNDSHEET record body.
    fn parse_boundsheet(data: &[u8]) -> XlsResult<SheetInfo> {
        let mut offset = 0;
        let abs_offset = read_u32(data, &mut offset)?;
        let visibility = read_u8(data, &mut offset)? & 0x03;
        let sheet_type = read_u8(data, &mut offset)?;
        let name = read_short_string(data, &mut offset)?;

        Ok(SheetInfo {
            offset: abs_offset,
            visibility,
            sheet_type,
            name,
        })
    }

    /// Split the records after the globals into BOF..EOF groups.
    /// Nested substreams (embedded charts) are folded into their parent.
    fn split_sheet_records(records: &[BiffRecord]) -> Vec<SheetRecords<'_>> {
        let mut groups: Vec<SheetRecords<'_>> = Vec::new();
        let mut current: Option<SheetRecords<'_>> = None;
        let mut depth = 0usize;

        for rec in records {
            match rec.record_type {
                records::BOF => {
                    if depth == 0 {
                        current = Some(SheetRecords {
                            bof_offset: rec.stream_offset,
                            records: Vec::new(),
                        });
                    }
                    depth += 1;
                }
                records::EOF if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                    }
                }
                _ if depth == 1 => {
                    if let Some(ref mut group) = current {
                        group.records.push(rec);
                    }
                }
                _ => {}
            }
        }

        groups
    }

    /// Parse cell records from a sheet's record group.
    fn parse_sheet_records(
        records: &[&BiffRecord],
        ws: &mut Worksheet,
        sst: &[String],
        styles: &[Style],
    ) -> XlsResult<()> {
        // a FORMULA with a string result is followed by its STRING record
        let mut pending_formula_cell: Option<(u32, u16)> = None;

        for rec in records {
            let data = rec.data.as_slice();
            if rec.record_type != records::STRING {
                pending_formula_cell = None;
            }
            match rec.record_type {
                records::LABELSST => Self::parse_labelsst(data, ws, sst, styles)?,
                records::LABEL => Self::parse_label(rec, ws, styles)?,
                records::NUMBER => Self::parse_number(data, ws, styles)?,
                records::RK => Self::parse_rk(data, ws, styles)?,
                records::MULRK => Self::parse_mulrk(data, ws, styles)?,
                records::BLANK => Self::parse_blank(data, ws, styles)?,
                records::MULBLANK => Self::parse_mulblank(data, ws, styles)?,
                records::BOOLERR => Self::parse_boolerr(data, ws, styles)?,
                records::FORMULA => {
                    pending_formula_cell = Self::parse_formula(data, ws, styles)?;
                }
                records::STRING => {
                    if let Some((row, col)) = pending_formula_cell.take() {
                        let mut off = 0;
                        let text = read_unicode_string(data, &mut off)?;
                        ws.set_cell_value_at(row, col, CellValue::formula("", Some(CellValue::text(text))))?;
                    }
                }
                records::MERGECELLS => Self::parse_mergecells(data, ws)?,
                records::ROW => Self::parse_row(data, ws)?,
                records::COLINFO => Self::parse_colinfo(data, ws)?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Row, column and XF index that start every cell record
    fn cell_header(data: &[u8], off: &mut usize) -> XlsResult<(u32, u16, u16)> {
        let row = read_u16(data, off)? as u32;
        let col = read_u16(data, off)?;
        let xf_idx = read_u16(data, off)?;
        Ok((row, col, xf_idx))
    }

    /// Apply a style from the XF table to a cell.
    #[inline]
    fn apply_style(
        ws: &mut Worksheet,
        row: u32,
        col: u16,
        xf_idx: u16,
        styles: &[Style],
    ) -> XlsResult<()> {
        if let Some(style) = styles.get(xf_idx as usize) {
            if *style != Style::default() {
                ws.set_cell_style_at(row, col, style)?;
            }
        }
        Ok(())
    }

    fn set_cell(
        ws: &mut Worksheet,
        (row, col, xf_idx): (u32, u16, u16),
        value: CellValue,
        styles: &[Style],
    ) -> XlsResult<()> {
        ws.set_cell_value_at(row, col, value)?;
        Self::apply_style(ws, row, col, xf_idx, styles)
    }

    // ── Cell record parsers ──────────────────────────────────────────────

    /// LABELSST: row(2) + col(2) + xf(2) + sst_index(4)
    fn parse_labelsst(data: &[u8], ws: &mut Worksheet, sst: &[String], styles: &[Style]) -> XlsResult<()> {
        let mut off = 0;
        let cell = Self::cell_header(data, &mut off)?;
        let sst_idx = read_u32(data, &mut off)? as usize;

        match sst.get(sst_idx) {
            Some(s) => Self::set_cell(ws, cell, CellValue::text(s), styles),
            None => {
                log::warn!("LABELSST refers to missing SST entry {sst_idx}");
                Self::apply_style(ws, cell.0, cell.1, cell.2, styles)
            }
        }
    }

    /// LABEL: row(2) + col(2) + xf(2) + unicode_string, possibly continued
    fn parse_label(rec: &BiffRecord, ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        let mut off = 0;
        let cell = Self::cell_header(&rec.data, &mut off)?;
        let text = read_continued_string(rec, &mut off)?;
        Self::set_cell(ws, cell, CellValue::text(text), styles)
    }

    /// NUMBER: row(2) + col(2) + xf(2) + f64(8)
    fn parse_number(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        let mut off = 0;
        let cell = Self::cell_header(data, &mut off)?;
        let value = read_f64(data, &mut off)?;
        Self::set_cell(ws, cell, CellValue::Number(value), styles)
    }

    /// RK: row(2) + col(2) + xf(2) + rk(4)
    fn parse_rk(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        let mut off = 0;
        let cell = Self::cell_header(data, &mut off)?;
        let value = read_rk(data, &mut off)?;
        Self::set_cell(ws, cell, CellValue::Number(value), styles)
    }

    /// MULRK: row(2) + first_col(2) + [xf(2) + rk(4)]* + last_col(2)
    fn parse_mulrk(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        if data.len() < 6 {
            return Err(XlsError::Parse("MULRK record too short".into()));
        }
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let first_col = read_u16(data, &mut off)?;
        let last_col = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);
        let rk_data_end = data.len() - 2;

        let mut col = first_col;
        while off + 6 <= rk_data_end && col <= last_col {
            let xf_idx = read_u16(data, &mut off)?;
            let value = read_rk(data, &mut off)?;
            Self::set_cell(ws, (row, col, xf_idx), CellValue::Number(value), styles)?;
            col += 1;
        }

        Ok(())
    }

    /// BLANK: row(2) + col(2) + xf(2); an empty cell that carries formatting.
    fn parse_blank(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        let mut off = 0;
        let (row, col, xf_idx) = Self::cell_header(data, &mut off)?;
        Self::apply_style(ws, row, col, xf_idx, styles)
    }

    /// MULBLANK: row(2) + first_col(2) + [xf(2)]* + last_col(2)
    fn parse_mulblank(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        if data.len() < 6 {
            return Ok(());
        }
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let first_col = read_u16(data, &mut off)?;
        let last_col = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);
        let xf_data_end = data.len() - 2;

        let mut col = first_col;
        while off + 2 <= xf_data_end && col <= last_col {
            let xf_idx = read_u16(data, &mut off)?;
            Self::apply_style(ws, row, col, xf_idx, styles)?;
            col += 1;
        }
        Ok(())
    }

    /// BOOLERR: row(2) + col(2) + xf(2) + value(1) + is_error(1)
    fn parse_boolerr(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<()> {
        let mut off = 0;
        let cell = Self::cell_header(data, &mut off)?;
        let val = read_u8(data, &mut off)?;
        let is_error = read_u8(data, &mut off)?;

        let value = if is_error != 0 {
            CellValue::Error(CellError::from_code(val).unwrap_or(CellError::Value))
        } else {
            CellValue::Boolean(val != 0)
        };
        Self::set_cell(ws, cell, value, styles)
    }

    /// FORMULA: row(2) + col(2) + xf(2) + result(8) + options(2) + reserved(4) + parsed expression
    ///
    /// Only the cached result is kept. Returns the cell position when the
    /// result is a string, which arrives in the following STRING record.
    fn parse_formula(data: &[u8], ws: &mut Worksheet, styles: &[Style]) -> XlsResult<Option<(u32, u16)>> {
        let mut off = 0;
        let cell = Self::cell_header(data, &mut off)?;
        let result = read_bytes8(data, &mut off)?;
        let (row, col, _) = cell;

        // bytes 6-7 == 0xFFFF mark a non-numeric result
        let (cached, pending) = if result[6] == 0xFF && result[7] == 0xFF {
            match result[0] {
                0x00 => (None, Some((row, col))),
                0x01 => (Some(CellValue::Boolean(result[2] != 0)), None),
                0x02 => (
                    Some(CellValue::Error(
                        CellError::from_code(result[2]).unwrap_or(CellError::Value),
                    )),
                    None,
                ),
                0x03 => (Some(CellValue::text("")), None),
                other => {
                    log::warn!("FORMULA at {} has unknown result type {other}", CellAddress::new(row, col));
                    (None, None)
                }
            }
        } else {
            (Some(CellValue::Number(f64::from_le_bytes(result))), None)
        };

        Self::set_cell(ws, cell, CellValue::formula("", cached), styles)?;
        Ok(pending)
    }

    // ── Structural record parsers ────────────────────────────────────────

    /// MERGECELLS: count(2) + [first_row(2) + last_row(2) + first_col(2) + last_col(2)]*
    fn parse_mergecells(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        let mut off = 0;
        let count = read_u16(data, &mut off)? as usize;

        for _ in 0..count {
            if off + 8 > data.len() {
                log::warn!("MERGECELLS lists {count} ranges but is truncated");
                break;
            }
            let first_row = read_u16(data, &mut off)? as u32;
            let last_row = read_u16(data, &mut off)? as u32;
            let first_col = read_u16(data, &mut off)?;
            let last_col = read_u16(data, &mut off)?;

            let range = CellRange::from_indices(first_row, first_col, last_row, last_col);
            if let Err(e) = ws.merge_cells(&range) {
                log::warn!("ignoring merged range {range}: {e}");
            }
        }

        Ok(())
    }

    /// ROW: row_index(2) + first_col(2) + last_col_plus1(2) + height(2) + reserved(4) + options(4)
    fn parse_row(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        if data.len() < 16 {
            return Ok(());
        }
        let mut off = 0;
        let row_index = read_u16(data, &mut off)? as u32;
        off += 4;
        let raw_height = read_u16(data, &mut off)?;
        off = 12;
        let options = read_u32(data, &mut off)?;

        let height_pt = (raw_height & 0x7FFF) as f64 / 20.0;
        if options & 0x20 != 0 {
            ws.set_row_hidden(row_index, true);
        }
        if options & 0x40 != 0 && height_pt > 0.0 {
            ws.set_row_height(row_index, height_pt);
        }

        Ok(())
    }

    /// COLINFO: first_col(2) + last_col(2) + width(2) + xf(2) + options(2) + reserved(2)
    fn parse_colinfo(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        if data.len() < 10 {
            return Ok(());
        }
        let mut off = 0;
        let first_col = read_u16(data, &mut off)?;
        let last_col = read_u16(data, &mut off)?.min(rowbind_core::MAX_COLS - 1);
        let raw_width = read_u16(data, &mut off)?;
        let _xf = read_u16(data, &mut off)?;
        let options = read_u16(data, &mut off)?;

        let hidden = (options & 0x0001) != 0;
        let width_chars = raw_width as f64 / 256.0;

        for col in first_col..=last_col {
            if hidden {
                ws.set_column_hidden(col, true);
            }
            if width_chars > 0.0 {
                ws.set_column_width(col, width_chars);
            }
        }

        Ok(())
    }
}
