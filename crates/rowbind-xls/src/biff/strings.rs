//! BIFF8 Unicode strings.
//!
//! BIFF8 strings have a complex encoding:
//! - Header: char_count (1 or 2 bytes) + flags (1 byte)
//! - Flags bit 0 (`fHighByte`): 0 = compressed Latin-1, 1 = uncompressed UTF-16LE
//! - Flags bit 2 (`fExtSt`): extended string data follows (Asian phonetic)
//! - Flags bit 3 (`fRichSt`): rich text run array follows
//! - If fRichSt: 2-byte run count follows the flags
//! - If fExtSt: 4-byte extended data size follows
//! - Then the character data, then the runs (4 bytes each), then the ext data
//!
//! In SST records, character data may be split across CONTINUE records. Each
//! continuation of a split string starts with a fresh flags byte, so the
//! encoding can switch between compressed and UTF-16 mid-string.

use super::parser::{read_u16, read_u32, read_u8};
use super::BiffRecord;
use crate::error::{XlsError, XlsResult};

const FLAG_WIDE: u8 = 0x01;
const FLAG_EXT: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

/// Read a BIFF8 "short" string (1-byte length prefix, used in BOUNDSHEET etc.).
pub fn read_short_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let char_count = read_u8(data, offset)? as u16;
    let flags = read_u8(data, offset)?;
    read_character_data(data, offset, char_count, flags)
}

/// Read a BIFF8 Unicode string with a 2-byte length prefix (used in LABEL,
/// FORMAT, STRING).
///
/// Does not handle CONTINUE boundaries; see [`read_continued_string`] and
/// [`parse_sst`].
pub fn read_unicode_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let char_count = read_u16(data, offset)?;
    let flags = read_u8(data, offset)?;

    let run_count = if flags & FLAG_RICH != 0 {
        read_u16(data, offset)?
    } else {
        0
    };
    let ext_size = if flags & FLAG_EXT != 0 {
        read_u32(data, offset)?
    } else {
        0
    };

    let text = read_character_data(data, offset, char_count, flags)?;
    *offset += run_count as usize * 4 + ext_size as usize;
    Ok(text)
}

/// Read character data (no header) given char_count and flags byte.
fn read_character_data(
    data: &[u8],
    offset: &mut usize,
    char_count: u16,
    flags: u8,
) -> XlsResult<String> {
    let count = char_count as usize;
    let width = if flags & FLAG_WIDE != 0 { 2 } else { 1 };
    let byte_len = count * width;

    if *offset + byte_len > data.len() {
        return Err(XlsError::Parse(format!(
            "string data too short: need {} bytes at offset {}, have {}",
            byte_len,
            *offset,
            data.len().saturating_sub(*offset)
        )));
    }
    let bytes = &data[*offset..*offset + byte_len];
    *offset += byte_len;

    if width == 2 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .collect();
        String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16 string: {e}")))
    } else {
        Ok(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Walks a merged record body, aware of where each CONTINUE began.
struct ContinuedCursor<'a> {
    data: &'a [u8],
    continues: &'a [usize],
    pos: usize,
}

impl<'a> ContinuedCursor<'a> {
    /// First CONTINUE boundary at or after the current position
    fn next_boundary(&self) -> Option<usize> {
        self.continues.iter().copied().find(|&b| b >= self.pos)
    }

    fn read_string(&mut self) -> XlsResult<String> {
        let char_count = read_u16(self.data, &mut self.pos)? as usize;
        let flags = read_u8(self.data, &mut self.pos)?;

        let run_count = if flags & FLAG_RICH != 0 {
            read_u16(self.data, &mut self.pos)?
        } else {
            0
        };
        let ext_size = if flags & FLAG_EXT != 0 {
            read_u32(self.data, &mut self.pos)?
        } else {
            0
        };

        let mut wide = flags & FLAG_WIDE != 0;
        let mut units: Vec<u16> = Vec::with_capacity(char_count);
        while units.len() < char_count {
            let limit = match self.next_boundary() {
                Some(b) if b == self.pos => {
                    // split string: the continuation restates the encoding
                    wide = read_u8(self.data, &mut self.pos)? & FLAG_WIDE != 0;
                    continue;
                }
                Some(b) => b,
                None => self.data.len(),
            };

            let width = if wide { 2 } else { 1 };
            let available = (limit - self.pos) / width;
            if available == 0 {
                return Err(XlsError::Parse(format!(
                    "string truncated at offset {}",
                    self.pos
                )));
            }
            let take = available.min(char_count - units.len());
            let bytes = &self.data[self.pos..self.pos + take * width];
            if wide {
                units.extend(
                    bytes
                        .chunks_exact(2)
                        .map(|p| u16::from_le_bytes([p[0], p[1]])),
                );
            } else {
                units.extend(bytes.iter().map(|&b| b as u16));
            }
            self.pos += take * width;
        }

        self.pos += run_count as usize * 4 + ext_size as usize;
        String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16 string: {e}")))
    }
}

/// Read a string with a 2-byte length prefix from a record whose character
/// data may run on into CONTINUE bodies, as long LABEL cells do.
pub fn read_continued_string(record: &BiffRecord, offset: &mut usize) -> XlsResult<String> {
    let mut cursor = ContinuedCursor {
        data: &record.data,
        continues: &record.continues,
        pos: *offset,
    };
    let text = cursor.read_string()?;
    *offset = cursor.pos;
    Ok(text)
}

/// Parse the Shared String Table from an SST record (CONTINUE bodies merged).
///
/// The SST body starts with:
/// - `total_strings` (u32): total string refs in the workbook
/// - `unique_strings` (u32): number of entries in this table
/// - then `unique_strings` Unicode string entries
pub fn parse_sst(record: &BiffRecord) -> XlsResult<Vec<String>> {
    let mut cursor = ContinuedCursor {
        data: &record.data,
        continues: &record.continues,
        pos: 0,
    };

    let _total_strings = read_u32(cursor.data, &mut cursor.pos)?;
    let unique_count = read_u32(cursor.data, &mut cursor.pos)? as usize;

    // each entry takes at least 3 bytes, so a corrupt count cannot force a huge allocation
    let mut strings = Vec::with_capacity(unique_count.min(record.data.len() / 3));

    for i in 0..unique_count {
        match cursor.read_string() {
            Ok(s) => strings.push(s),
            Err(e) => {
                log::warn!("SST parse error at string {i}/{unique_count}: {e}");
                break;
            }
        }
    }

    Ok(strings)
}

// ── Encoding ────────────────────────────────────────────────────────────

/// Character data for `s`: `(is_wide, bytes)`.
///
/// Strings whose characters all fit in Latin-1 are stored compressed, one
/// byte per character; anything else as UTF-16LE.
pub fn encode_chars(s: &str) -> (bool, Vec<u8>) {
    if s.chars().all(|c| (c as u32) <= 0xFF) {
        (false, s.chars().map(|c| c as u8).collect())
    } else {
        let bytes = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        (true, bytes)
    }
}

/// Number of characters BIFF8 counts for `s` (UTF-16 code units)
pub fn char_count(s: &str) -> usize {
    s.encode_utf16().count()
}

fn truncated(s: &str, max_units: usize) -> &str {
    let mut units = 0;
    for (idx, c) in s.char_indices() {
        units += c.len_utf16();
        if units > max_units {
            return &s[..idx];
        }
    }
    s
}

/// Append a string with a 1-byte length prefix, cut to 255 characters.
pub fn write_short_string(buf: &mut Vec<u8>, s: &str) {
    let s = truncated(s, u8::MAX as usize);
    let (wide, bytes) = encode_chars(s);
    buf.push(char_count(s) as u8);
    buf.push(if wide { FLAG_WIDE } else { 0 });
    buf.extend_from_slice(&bytes);
}

/// Append a string with a 2-byte length prefix, cut to 65535 characters.
pub fn write_unicode_string(buf: &mut Vec<u8>, s: &str) {
    let s = truncated(s, u16::MAX as usize);
    let (wide, bytes) = encode_chars(s);
    buf.extend_from_slice(&(char_count(s) as u16).to_le_bytes());
    buf.push(if wide { FLAG_WIDE } else { 0 });
    buf.extend_from_slice(&bytes);
}
