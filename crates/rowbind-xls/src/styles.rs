//! BIFF8 style records.
//!
//! Reading: FONT, FORMAT and XF records from the workbook globals are
//! resolved into `rowbind_core::Style` objects, one per XF.
//!
//! Writing: [`StyleTable`] interns the styles used by a workbook and emits
//! the matching FONT, FORMAT, XF and STYLE records.

use std::collections::HashMap;

use rowbind_core::{
    Alignment, FontStyle, HorizontalAlignment, NumberFormat, Style, Underline, VerticalAlignment,
};

use crate::biff::parser::{read_u16, read_u8};
use crate::biff::records;
use crate::biff::strings::{read_short_string, read_unicode_string, write_short_string, write_unicode_string};
use crate::biff::writer::BiffWriter;
use crate::error::{XlsError, XlsResult};

/// Style XFs every BIFF8 workbook starts with
const STYLE_XF_COUNT: u16 = 15;
/// The cell XF used by unformatted cells
pub(crate) const DEFAULT_CELL_XF: u16 = STYLE_XF_COUNT;
/// Fonts 0-3 are fixed; font index 4 does not exist in BIFF8
const FIRST_CUSTOM_FONT: u16 = 5;
/// Format IDs below this are reserved for built-in formats
const FIRST_CUSTOM_FORMAT: u16 = 164;
const MAX_XF: usize = 4050;

// ============================================================================
// Intermediate BIFF types
// ============================================================================

/// Parsed FONT record data.
#[derive(Debug, Clone)]
pub(crate) struct BiffFont {
    /// Font height in twips (1/20 of a point).
    pub height_twips: u16,
    pub bold: bool,
    pub italic: bool,
    pub underline: u8,
    pub strikethrough: bool,
    pub name: String,
}

/// Parsed XF record data (20 bytes in BIFF8), reduced to the parts we model.
#[derive(Debug, Clone, Default)]
pub(crate) struct BiffXf {
    pub font_index: u16,
    pub format_index: u16,
    pub hor_align: u8,
    pub vert_align: u8,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    pub indent: u8,
    pub rotation: u8,
}

/// All style data collected from the workbook globals stream.
#[derive(Default)]
pub(crate) struct StyleContext {
    pub fonts: Vec<BiffFont>,
    pub formats: HashMap<u16, String>,
    pub xfs: Vec<BiffXf>,
}

impl StyleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the resolved style table (one `Style` per XF record).
    pub fn build_style_table(&self) -> Vec<Style> {
        self.xfs.iter().map(|xf| self.resolve_xf(xf)).collect()
    }

    fn resolve_xf(&self, xf: &BiffXf) -> Style {
        Style {
            font: self.resolve_font(xf.font_index),
            alignment: resolve_alignment(xf),
            number_format: self.resolve_number_format(xf.format_index),
        }
    }

    fn resolve_font(&self, font_index: u16) -> FontStyle {
        // Indices 0-3 map directly; index 5 -> fonts[4], index 6 -> fonts[5], etc.
        let actual = if font_index >= FIRST_CUSTOM_FONT {
            (font_index - 1) as usize
        } else {
            font_index as usize
        };

        let Some(bf) = self.fonts.get(actual) else {
            return FontStyle::default();
        };

        FontStyle {
            name: bf.name.clone(),
            size: bf.height_twips as f64 / 20.0,
            bold: bf.bold,
            italic: bf.italic,
            underline: underline_from_biff(bf.underline),
            strikethrough: bf.strikethrough,
        }
    }

    fn resolve_number_format(&self, fmt_id: u16) -> NumberFormat {
        if let Some(code) = self.formats.get(&fmt_id) {
            return NumberFormat::Custom(code.clone());
        }
        NumberFormat::from_id(fmt_id)
    }
}

fn resolve_alignment(xf: &BiffXf) -> Alignment {
    let horizontal = match xf.hor_align {
        1 => HorizontalAlignment::Left,
        2 => HorizontalAlignment::Center,
        3 => HorizontalAlignment::Right,
        4 => HorizontalAlignment::Fill,
        5 => HorizontalAlignment::Justify,
        6 => HorizontalAlignment::CenterContinuous,
        7 => HorizontalAlignment::Distributed,
        _ => HorizontalAlignment::General,
    };

    let vertical = match xf.vert_align {
        0 => VerticalAlignment::Top,
        1 => VerticalAlignment::Center,
        3 => VerticalAlignment::Justify,
        4 => VerticalAlignment::Distributed,
        _ => VerticalAlignment::Bottom,
    };

    Alignment {
        horizontal,
        vertical,
        wrap_text: xf.wrap_text,
        shrink_to_fit: xf.shrink_to_fit,
        indent: xf.indent,
        rotation: xf.rotation,
    }
}

fn underline_from_biff(code: u8) -> Underline {
    match code {
        0x01 => Underline::Single,
        0x02 => Underline::Double,
        0x21 => Underline::SingleAccounting,
        0x22 => Underline::DoubleAccounting,
        _ => Underline::None,
    }
}

fn underline_to_biff(underline: Underline) -> u8 {
    match underline {
        Underline::None => 0x00,
        Underline::Single => 0x01,
        Underline::Double => 0x02,
        Underline::SingleAccounting => 0x21,
        Underline::DoubleAccounting => 0x22,
    }
}

fn horizontal_to_biff(align: HorizontalAlignment) -> u8 {
    match align {
        HorizontalAlignment::General => 0,
        HorizontalAlignment::Left => 1,
        HorizontalAlignment::Center => 2,
        HorizontalAlignment::Right => 3,
        HorizontalAlignment::Fill => 4,
        HorizontalAlignment::Justify => 5,
        HorizontalAlignment::CenterContinuous => 6,
        HorizontalAlignment::Distributed => 7,
    }
}

fn vertical_to_biff(align: VerticalAlignment) -> u8 {
    match align {
        VerticalAlignment::Top => 0,
        VerticalAlignment::Center => 1,
        VerticalAlignment::Bottom => 2,
        VerticalAlignment::Justify => 3,
        VerticalAlignment::Distributed => 4,
    }
}

// ============================================================================
// Record parsers
// ============================================================================

/// Parse a FONT record (0x0031).
///
/// Layout:
///   0  u16  dyHeight   font height in twips (1/20 pt)
///   2  u16  grbit      flags (bit 1 = italic, bit 3 = strikethrough)
///   4  u16  icv        color index
///   6  u16  bls        weight (400 = normal, 700 = bold)
///   8  u16  sss        super/subscript
///  10  u8   uls        underline type
///  11  u8   bFamily
///  12  u8   bCharSet
///  13  u8   reserved
///  14  ...  font name  short string
pub(crate) fn parse_font(data: &[u8]) -> XlsResult<BiffFont> {
    if data.len() < 15 {
        return Err(XlsError::Parse("FONT record too short".into()));
    }

    let mut off = 0;
    let height = read_u16(data, &mut off)?;
    let grbit = read_u16(data, &mut off)?;
    let _icv = read_u16(data, &mut off)?;
    let bls = read_u16(data, &mut off)?;
    let _sss = read_u16(data, &mut off)?;
    let uls = read_u8(data, &mut off)?;
    off += 3;

    let name = read_short_string(data, &mut off).unwrap_or_default();

    Ok(BiffFont {
        height_twips: height,
        italic: (grbit & 0x0002) != 0,
        strikethrough: (grbit & 0x0008) != 0,
        bold: bls >= 700,
        underline: uls,
        name,
    })
}

/// Parse a FORMAT record (0x041E): format ID + unicode string.
pub(crate) fn parse_format(data: &[u8]) -> XlsResult<(u16, String)> {
    let mut off = 0;
    let ifmt = read_u16(data, &mut off)?;
    let s = read_unicode_string(data, &mut off)?;
    Ok((ifmt, s))
}

/// Parse an XF record (0x00E0). Borders, fills and protection are skipped.
pub(crate) fn parse_xf(data: &[u8]) -> XlsResult<BiffXf> {
    if data.len() < 20 {
        return Err(XlsError::Parse(format!(
            "XF record too short: {} bytes (expected 20)",
            data.len()
        )));
    }

    let mut off = 0;
    let font_index = read_u16(data, &mut off)?;
    let format_index = read_u16(data, &mut off)?;
    let _type_prot = read_u16(data, &mut off)?;
    let align1 = read_u8(data, &mut off)?;
    let rotation = read_u8(data, &mut off)?;
    let align2 = read_u8(data, &mut off)?;

    Ok(BiffXf {
        font_index,
        format_index,
        hor_align: align1 & 0x07,
        wrap_text: (align1 & 0x08) != 0,
        vert_align: (align1 >> 4) & 0x07,
        rotation,
        indent: align2 & 0x0F,
        shrink_to_fit: (align2 & 0x10) != 0,
    })
}

// ============================================================================
// Writer side
// ============================================================================

/// Fonts, formats and XFs needed to write a workbook.
///
/// Unformatted cells use [`DEFAULT_CELL_XF`]; every distinct style gets its
/// own cell XF after the ones already present.
#[derive(Debug)]
pub(crate) struct StyleTable {
    fonts: Vec<FontStyle>,
    formats: Vec<(u16, String)>,
    xfs: Vec<BiffXf>,
    index: HashMap<Style, u16>,
    /// Default fonts emitted before ours so that index 4 stays skipped
    padding_fonts: u16,
    first_font: u16,
    first_format: u16,
    first_xf: u16,
}

impl StyleTable {
    /// Table for a new workbook
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            formats: Vec::new(),
            xfs: Vec::new(),
            index: HashMap::new(),
            padding_fonts: 0,
            first_font: FIRST_CUSTOM_FONT,
            first_format: FIRST_CUSTOM_FORMAT,
            first_xf: DEFAULT_CELL_XF + 1,
        }
    }

    /// Table whose records extend an existing workbook that holds
    /// `font_records` FONT and `xf_records` XF records, with custom number
    /// formats up to `last_format`.
    pub fn continuing(font_records: usize, last_format: Option<u16>, xf_records: usize) -> Self {
        let padding_fonts = 4usize.saturating_sub(font_records) as u16;
        let fonts_before = font_records.max(4) as u16;
        let first_format = last_format
            .map_or(FIRST_CUSTOM_FORMAT, |id| id.saturating_add(1))
            .max(FIRST_CUSTOM_FORMAT);
        Self {
            padding_fonts,
            first_font: fonts_before + 1,
            first_format,
            first_xf: xf_records as u16,
            ..Self::new()
        }
    }

    /// XF index for `style`, registering it on first use
    pub fn xf_index(&mut self, style: &Style) -> XlsResult<u16> {
        if *style == Style::default() {
            return Ok(DEFAULT_CELL_XF);
        }
        if let Some(&idx) = self.index.get(style) {
            return Ok(idx);
        }
        if self.first_xf as usize + self.xfs.len() >= MAX_XF {
            return Err(XlsError::Write(format!(
                "more than {MAX_XF} distinct cell styles"
            )));
        }

        let xf = BiffXf {
            font_index: self.font_index(&style.font),
            format_index: self.format_index(&style.number_format),
            hor_align: horizontal_to_biff(style.alignment.horizontal),
            vert_align: vertical_to_biff(style.alignment.vertical),
            wrap_text: style.alignment.wrap_text,
            shrink_to_fit: style.alignment.shrink_to_fit,
            indent: style.alignment.indent.min(15),
            rotation: style.alignment.rotation,
        };
        let idx = self.first_xf + self.xfs.len() as u16;
        self.xfs.push(xf);
        self.index.insert(style.clone(), idx);
        Ok(idx)
    }

    fn font_index(&mut self, font: &FontStyle) -> u16 {
        if *font == FontStyle::default() {
            return 0;
        }
        let pos = match self.fonts.iter().position(|f| f == font) {
            Some(pos) => pos,
            None => {
                self.fonts.push(font.clone());
                self.fonts.len() - 1
            }
        };
        self.first_font + pos as u16
    }

    fn format_index(&mut self, format: &NumberFormat) -> u16 {
        match format {
            NumberFormat::General => 0,
            NumberFormat::BuiltIn(id) => *id,
            NumberFormat::Custom(code) => {
                if let Some((id, _)) = self.formats.iter().find(|(_, c)| c == code) {
                    return *id;
                }
                let id = self.first_format + self.formats.len() as u16;
                self.formats.push((id, code.clone()));
                id
            }
        }
    }

    /// FONT, FORMAT, XF and STYLE records of a new workbook, in the order
    /// BIFF8 requires
    pub fn write_records(&self, w: &mut BiffWriter) {
        let default_font = FontStyle::default();
        for _ in 0..4 {
            w.record(records::FONT, &font_body(&default_font));
        }
        self.font_records(w);
        self.format_records(w);

        let default_xf = BiffXf {
            vert_align: vertical_to_biff(VerticalAlignment::Bottom),
            ..BiffXf::default()
        };
        for _ in 0..STYLE_XF_COUNT {
            w.record(records::XF, &xf_body(&default_xf, true));
        }
        w.record(records::XF, &xf_body(&default_xf, false));
        self.cell_xf_records(w);

        // built-in "Normal" style bound to the first style XF
        w.record(records::STYLE, &[0x00, 0x80, 0x00, 0xFF]);
    }

    /// FONT records of the registered fonts
    pub fn font_records(&self, w: &mut BiffWriter) {
        let default_font = FontStyle::default();
        for _ in 0..self.padding_fonts {
            w.record(records::FONT, &font_body(&default_font));
        }
        for font in &self.fonts {
            w.record(records::FONT, &font_body(font));
        }
    }

    pub fn format_records(&self, w: &mut BiffWriter) {
        for (id, code) in &self.formats {
            let mut body = Vec::with_capacity(5 + code.len());
            body.extend_from_slice(&id.to_le_bytes());
            write_unicode_string(&mut body, code);
            w.record(records::FORMAT, &body);
        }
    }

    /// XF records of the registered styles
    pub fn cell_xf_records(&self, w: &mut BiffWriter) {
        for xf in &self.xfs {
            w.record(records::XF, &xf_body(xf, false));
        }
    }
}

fn font_body(font: &FontStyle) -> Vec<u8> {
    let mut body = Vec::with_capacity(16 + font.name.len());
    let height = (font.size * 20.0).round().clamp(20.0, 8191.0) as u16;
    let mut grbit = 0u16;
    if font.italic {
        grbit |= 0x0002;
    }
    if font.strikethrough {
        grbit |= 0x0008;
    }
    let weight: u16 = if font.bold { 700 } else { 400 };

    body.extend_from_slice(&height.to_le_bytes());
    body.extend_from_slice(&grbit.to_le_bytes());
    body.extend_from_slice(&0x7FFFu16.to_le_bytes());
    body.extend_from_slice(&weight.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.push(underline_to_biff(font.underline));
    body.extend_from_slice(&[0, 0, 0]);
    write_short_string(&mut body, &font.name);
    body
}

fn xf_body(xf: &BiffXf, is_style_xf: bool) -> [u8; 20] {
    let mut body = [0u8; 20];
    body[0..2].copy_from_slice(&xf.font_index.to_le_bytes());
    body[2..4].copy_from_slice(&xf.format_index.to_le_bytes());
    let type_prot: u16 = if is_style_xf { 0xFFF5 } else { 0x0001 };
    body[4..6].copy_from_slice(&type_prot.to_le_bytes());

    let mut align1 = (xf.hor_align & 0x07) | ((xf.vert_align & 0x07) << 4);
    if xf.wrap_text {
        align1 |= 0x08;
    }
    body[6] = align1;
    body[7] = xf.rotation;
    body[8] = (xf.indent & 0x0F) | if xf.shrink_to_fit { 0x10 } else { 0 };
    // cell XFs own every attribute group, style XFs none
    body[9] = if is_style_xf { 0x00 } else { 0xFC };
    // borders (12..18) stay zero; fill colors default to automatic
    body[18..20].copy_from_slice(&0x20C0u16.to_le_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::read_all_records;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_parse_font_basic() {
        let body = font_body(&FontStyle::default().with_size(11.0));
        let font = parse_font(&body).unwrap();
        assert_eq!(font.height_twips, 220);
        assert!(!font.bold);
        assert!(!font.italic);
        assert_eq!(font.underline, 0);
        assert_eq!(font.name, "Arial");
    }

    #[test]
    fn test_parse_font_bold_italic() {
        let mut style = FontStyle::default().with_bold(true).with_italic(true);
        style.underline = Underline::Double;
        style.strikethrough = true;

        let font = parse_font(&font_body(&style)).unwrap();
        assert!(font.bold);
        assert!(font.italic);
        assert!(font.strikethrough);
        assert_eq!(underline_from_biff(font.underline), Underline::Double);
    }

    #[test]
    fn test_parse_xf_alignment() {
        let xf = BiffXf {
            font_index: 5,
            format_index: 14,
            hor_align: 2,
            vert_align: 1,
            wrap_text: true,
            shrink_to_fit: true,
            indent: 3,
            rotation: 45,
        };
        let parsed = parse_xf(&xf_body(&xf, false)).unwrap();
        assert_eq!(parsed.font_index, 5);
        assert_eq!(parsed.format_index, 14);

        let alignment = resolve_alignment(&parsed);
        assert_eq!(alignment.horizontal, HorizontalAlignment::Center);
        assert_eq!(alignment.vertical, VerticalAlignment::Center);
        assert!(alignment.wrap_text);
        assert!(alignment.shrink_to_fit);
        assert_eq!(alignment.indent, 3);
        assert_eq!(alignment.rotation, 45);
    }

    #[test]
    fn test_font_index_skips_four() {
        let mut ctx = StyleContext::new();
        for name in ["A", "B", "C", "D", "E"] {
            ctx.fonts.push(BiffFont {
                height_twips: 200,
                bold: false,
                italic: false,
                underline: 0,
                strikethrough: false,
                name: name.into(),
            });
        }
        assert_eq!(ctx.resolve_font(3).name, "D");
        assert_eq!(ctx.resolve_font(5).name, "E");
        assert_eq!(ctx.resolve_font(9), FontStyle::default());
    }

    #[test]
    fn test_number_format_resolution() {
        let mut ctx = StyleContext::new();
        ctx.formats.insert(164, "yyyy-mm-dd".into());
        assert_eq!(ctx.resolve_number_format(0), NumberFormat::General);
        assert_eq!(ctx.resolve_number_format(14), NumberFormat::BuiltIn(14));
        assert_eq!(
            ctx.resolve_number_format(164),
            NumberFormat::Custom("yyyy-mm-dd".into())
        );
    }

    #[test]
    fn test_style_table_dedups() {
        let mut table = StyleTable::new();
        let bold = Style::new().bold(true);
        let date = Style::new().number_format("yyyy-mm-dd");

        assert_eq!(table.xf_index(&Style::default()).unwrap(), DEFAULT_CELL_XF);
        assert_eq!(table.xf_index(&bold).unwrap(), 16);
        assert_eq!(table.xf_index(&date).unwrap(), 17);
        assert_eq!(table.xf_index(&bold).unwrap(), 16);
        assert_eq!(table.formats, vec![(164, "yyyy-mm-dd".to_string())]);
        assert_eq!(table.xfs[0].font_index, 5);
        assert_eq!(table.xfs[1].font_index, 0);
    }

    #[test]
    fn test_continuing_table_numbers_after_existing() {
        let mut table = StyleTable::continuing(6, Some(170), 21);
        let header = Style::new().bold(true).wrap_text(true);
        let date = Style::new().number_format("yyyy-mm-dd");

        assert_eq!(table.xf_index(&Style::default()).unwrap(), DEFAULT_CELL_XF);
        assert_eq!(table.xf_index(&header).unwrap(), 21);
        assert_eq!(table.xf_index(&date).unwrap(), 22);
        // six records hold indices 0-3, 5 and 6
        assert_eq!(table.xfs[0].font_index, 7);
        assert_eq!(table.formats, vec![(171, "yyyy-mm-dd".to_string())]);

        let sparse = StyleTable::continuing(2, None, 16);
        assert_eq!(sparse.padding_fonts, 2);
        assert_eq!(sparse.first_font, 5);
        assert_eq!(sparse.first_format, FIRST_CUSTOM_FORMAT);
    }

    #[test]
    fn test_written_records_resolve_back() {
        let mut table = StyleTable::new();
        let header = Style::new().bold(true).wrap_text(true);
        let date = Style::new().number_format("yyyy-mm-dd");
        let header_xf = table.xf_index(&header).unwrap();
        let date_xf = table.xf_index(&date).unwrap();

        let mut w = BiffWriter::new();
        table.write_records(&mut w);

        let mut ctx = StyleContext::new();
        for rec in read_all_records(&mut Cursor::new(w.into_inner())).unwrap() {
            match rec.record_type {
                records::FONT => ctx.fonts.push(parse_font(&rec.data).unwrap()),
                records::FORMAT => {
                    let (id, code) = parse_format(&rec.data).unwrap();
                    ctx.formats.insert(id, code);
                }
                records::XF => ctx.xfs.push(parse_xf(&rec.data).unwrap()),
                _ => {}
            }
        }

        let resolved = ctx.build_style_table();
        assert_eq!(resolved.len(), 18);
        assert_eq!(resolved[DEFAULT_CELL_XF as usize], Style::default());
        assert_eq!(resolved[header_xf as usize], header);
        assert_eq!(resolved[date_xf as usize], date);
    }
}
