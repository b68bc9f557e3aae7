//! Adding a worksheet to an existing `.xls` file.
//!
//! The existing BIFF8 stream is kept byte for byte. The records the new
//! sheet needs (fonts, formats, XFs and one BOUNDSHEET entry) are spliced
//! into the workbook globals, and the new substream goes after the last
//! one. Stream positions moved by the insertions are re-pointed:
//! BOUNDSHEET offsets, EXTSST buckets and the DBCELL pointers of INDEX
//! records.
//!
//! New cells are written as inline LABEL records, so the shared string
//! table is left alone. Every other stream of the container (summary
//! information, VBA storages) is untouched.

use std::io::{Read, Seek, Write};

use rowbind_core::{check_sheet_name, Error as CoreError, Worksheet};

use crate::biff::parse_bof;
use crate::biff::parser::{read_u16, read_u32};
use crate::biff::records;
use crate::biff::strings::{read_short_string, write_short_string};
use crate::biff::writer::BiffWriter;
use crate::error::{XlsError, XlsResult};
use crate::styles::{StyleTable, DEFAULT_CELL_XF};
use crate::writer::{SharedStrings, XlsWriter, MIN_STREAM_SIZE};

/// Stream offsets that point into the sheet substreams
const INDEX: u16 = 0x020B;
/// SST bucket offsets
const EXTSST: u16 = 0x00FF;

/// One record together with its CONTINUE records
#[derive(Debug, Clone, Copy)]
struct Span {
    record_type: u16,
    start: usize,
    /// Body length of the leading record, without continuations
    body_len: usize,
    end: usize,
}

impl Span {
    fn body<'a>(&self, stream: &'a [u8]) -> &'a [u8] {
        &stream[self.start + 4..self.start + 4 + self.body_len]
    }
}

/// What the splice needs to know about the workbook globals
#[derive(Debug, Default)]
struct Globals {
    /// Index of the globals EOF in the span list
    eof: usize,
    fonts: usize,
    last_font: Option<usize>,
    last_format: Option<usize>,
    max_format_id: Option<u16>,
    first_xf: Option<usize>,
    last_xf: Option<usize>,
    xfs: usize,
    last_boundsheet: Option<usize>,
    sheet_names: Vec<String>,
}

/// Appends worksheets to an `.xls` file in place.
///
/// ```no_run
/// use rowbind_core::Worksheet;
/// use rowbind_xls::XlsAppender;
///
/// let file = std::fs::OpenOptions::new()
///     .read(true)
///     .write(true)
///     .open("people.xls")?;
/// let appender = XlsAppender::open(file)?;
/// appender.append(&Worksheet::new("Export"))?;
/// # Ok::<(), rowbind_xls::XlsError>(())
/// ```
pub struct XlsAppender<F> {
    cfb: cfb::CompoundFile<F>,
    stream_path: &'static str,
    stream: Vec<u8>,
    spans: Vec<Span>,
    globals: Globals,
}

impl<F: Read + Seek> XlsAppender<F> {
    /// Open the container and index its workbook stream.
    pub fn open(inner: F) -> XlsResult<Self> {
        let mut cfb = cfb::CompoundFile::open(inner)
            .map_err(|e| XlsError::InvalidFormat(format!("not a compound file: {e}")))?;

        let stream_path = if cfb.exists("/Workbook") {
            "/Workbook"
        } else if cfb.exists("/Book") {
            "/Book"
        } else {
            return Err(XlsError::InvalidFormat(
                "no Workbook or Book stream found in CFB".into(),
            ));
        };

        let mut stream = Vec::new();
        cfb.open_stream(stream_path)?.read_to_end(&mut stream)?;

        let spans = scan(&stream)?;
        let globals = index_globals(&stream, &spans)?;
        log::debug!(
            "{stream_path}: {} records before padding, {} sheets",
            spans.len(),
            globals.sheet_names.len()
        );

        Ok(Self {
            cfb,
            stream_path,
            stream,
            spans,
            globals,
        })
    }

    /// Names of the sheets already in the file, charts and macro sheets
    /// included
    pub fn sheet_names(&self) -> &[String] {
        &self.globals.sheet_names
    }
}

impl<F: Read + Write + Seek> XlsAppender<F> {
    /// Add `ws` after the last sheet and rewrite the workbook stream.
    ///
    /// The name is checked before anything is written. Returns the
    /// underlying file.
    pub fn append(mut self, ws: &Worksheet) -> XlsResult<F> {
        let stream = self.spliced(ws)?;
        {
            let mut out = self.cfb.create_stream(self.stream_path)?;
            out.write_all(&stream)?;
        }
        self.cfb.flush()?;
        log::debug!(
            "appended sheet '{}': {} -> {} bytes",
            ws.name(),
            self.stream.len(),
            stream.len()
        );
        Ok(self.cfb.into_inner())
    }
}

impl<F> XlsAppender<F> {
    /// The new workbook stream
    fn spliced(&self, ws: &Worksheet) -> XlsResult<Vec<u8>> {
        check_sheet_name(ws.name())?;
        let lower = ws.name().to_lowercase();
        if self
            .globals
            .sheet_names
            .iter()
            .any(|n| n.to_lowercase() == lower)
        {
            return Err(CoreError::DuplicateSheetName(ws.name().into()).into());
        }

        let g = &self.globals;
        let mut styles = StyleTable::continuing(g.fonts, g.max_format_id, g.xfs);
        // only styles and size limits matter here; cells go out as LABELs
        let xf_map = XlsWriter::collect_sheet(ws, &mut styles, &mut SharedStrings::default())?;

        let mut boundsheet = Vec::with_capacity(8 + ws.name().len() * 2);
        boundsheet.extend_from_slice(&0u32.to_le_bytes());
        boundsheet.push(if ws.is_visible() { 0 } else { 1 });
        boundsheet.push(0);
        write_short_string(&mut boundsheet, ws.name());

        let font_at = g
            .last_font
            .map_or_else(|| self.first_of(&[records::FORMAT, records::XF]), |i| i + 1);
        let format_at = g.last_format.map_or_else(|| self.first_of(&[records::XF]), |i| i + 1);
        let xf_at = g.last_xf.map_or(g.eof, |i| i + 1);
        let sheet_at = g.last_boundsheet.map_or(g.eof, |i| i + 1);

        let records_of = |emit: fn(&StyleTable, &mut BiffWriter)| {
            let mut w = BiffWriter::new();
            emit(&styles, &mut w);
            w.into_inner()
        };
        // (span index to insert before, bytes); ties keep this order
        let mut inserts: Vec<(usize, Vec<u8>)> = vec![
            (font_at, records_of(StyleTable::font_records)),
            (format_at, records_of(StyleTable::format_records)),
            (xf_at, records_of(StyleTable::cell_xf_records)),
        ];
        let mut w = BiffWriter::new();
        w.record(records::BOUNDSHEET, &boundsheet);
        let new_entry = inserts.len();
        inserts.push((sheet_at, w.into_inner()));

        // a position moves by the bytes inserted at or before it
        let moved_by: Vec<(usize, usize)> = inserts
            .iter()
            .map(|(at, bytes)| (self.spans[*at].start, bytes.len()))
            .collect();
        let shift = |pos: u32| -> u32 {
            let pos = pos as usize;
            let extra: usize = moved_by
                .iter()
                .filter(|(at, _)| *at <= pos)
                .map(|(_, len)| len)
                .sum();
            (pos + extra) as u32
        };

        let mut out = BiffWriter::new();
        let mut new_entry_at = 0;
        let mut order: Vec<usize> = (0..inserts.len()).collect();
        order.sort_by_key(|&i| inserts[i].0);
        let mut pending = order.into_iter().peekable();

        for (idx, span) in self.spans[..=g.eof].iter().enumerate() {
            while let Some(&i) = pending.peek() {
                if inserts[i].0 != idx {
                    break;
                }
                if i == new_entry {
                    new_entry_at = out.position() + 4;
                }
                out.raw(&inserts[i].1);
                pending.next();
            }

            let at = out.position();
            out.raw(&self.stream[span.start..span.end]);
            match span.record_type {
                records::BOUNDSHEET => {
                    let old = read_u32(span.body(&self.stream), &mut 0)?;
                    out.patch_u32(at + 4, shift(old));
                }
                EXTSST => {
                    let body = span.body(&self.stream);
                    let buckets = body.len().saturating_sub(2) / 8;
                    for k in 0..buckets {
                        let field = 2 + k * 8;
                        let mut off = field;
                        let old = read_u32(body, &mut off)?;
                        out.patch_u32(at + 4 + field, shift(old));
                    }
                }
                _ => {}
            }
        }

        for span in &self.spans[g.eof + 1..] {
            let at = out.position();
            out.raw(&self.stream[span.start..span.end]);
            if span.record_type == INDEX {
                let body = span.body(&self.stream);
                // ibXF at 12, then one DBCELL offset per row block
                for field in (12..body.len().saturating_sub(3)).step_by(4) {
                    let mut off = field;
                    let old = read_u32(body, &mut off)?;
                    if old != 0 {
                        out.patch_u32(at + 4 + field, shift(old));
                    }
                }
            }
        }

        out.patch_u32(new_entry_at, out.position() as u32);
        XlsWriter::write_sheet(&mut out, ws, &xf_map, &SharedStrings::default(), false);
        out.pad_to(MIN_STREAM_SIZE);
        Ok(out.into_inner())
    }

    /// First globals record of any of `types`, else the globals EOF
    fn first_of(&self, types: &[u16]) -> usize {
        self.spans[..self.globals.eof]
            .iter()
            .position(|s| types.contains(&s.record_type))
            .unwrap_or(self.globals.eof)
    }
}

/// Split the stream into records, stopping at the padding after the last
/// substream.
fn scan(stream: &[u8]) -> XlsResult<Vec<Span>> {
    let mut spans: Vec<Span> = Vec::new();
    let mut pos = 0;
    let mut depth = 0usize;

    while pos + 4 <= stream.len() {
        let record_type = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        let body_len = u16::from_le_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        if depth == 0 && record_type != records::BOF {
            break;
        }
        let end = pos + 4 + body_len;
        if end > stream.len() {
            return Err(XlsError::Parse(format!(
                "record 0x{record_type:04X} at offset {pos} is truncated"
            )));
        }

        match (record_type, spans.last_mut()) {
            (records::CONTINUE, Some(last)) => last.end = end,
            _ => spans.push(Span {
                record_type,
                start: pos,
                body_len,
                end,
            }),
        }
        match record_type {
            records::BOF => depth += 1,
            records::EOF => depth -= 1,
            _ => {}
        }
        pos = end;
    }

    if depth != 0 {
        return Err(XlsError::Parse("workbook stream ends inside a substream".into()));
    }
    Ok(spans)
}

fn index_globals(stream: &[u8], spans: &[Span]) -> XlsResult<Globals> {
    let Some(first) = spans.first() else {
        return Err(XlsError::InvalidFormat("empty workbook stream".into()));
    };
    let (version, dt) = parse_bof(first.body(stream))?;
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

    let mut g = Globals::default();
    let mut eof = None;
    for (idx, span) in spans.iter().enumerate().skip(1) {
        match span.record_type {
            records::EOF => {
                eof = Some(idx);
                break;
            }
            records::FONT => {
                g.fonts += 1;
                g.last_font = Some(idx);
            }
            records::FORMAT => {
                let id = read_u16(span.body(stream), &mut 0)?;
                g.max_format_id = g.max_format_id.max(Some(id));
                g.last_format = Some(idx);
            }
            records::XF => {
                g.xfs += 1;
                g.first_xf.get_or_insert(idx);
                g.last_xf = Some(idx);
            }
            records::BOUNDSHEET => {
                let mut off = 6;
                g.sheet_names.push(read_short_string(span.body(stream), &mut off)?);
                g.last_boundsheet = Some(idx);
            }
            _ => {}
        }
    }

    g.eof = eof.ok_or_else(|| {
        XlsError::InvalidFormat("no complete workbook globals substream found".into())
    })?;
    if g.xfs <= DEFAULT_CELL_XF as usize {
        return Err(XlsError::InvalidFormat(format!(
            "{} XF records, expected at least {}",
            g.xfs,
            DEFAULT_CELL_XF + 1
        )));
    }
    Ok(g)
}
