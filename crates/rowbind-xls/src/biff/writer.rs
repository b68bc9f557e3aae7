//! BIFF8 record output.
//!
//! Records are appended to an in-memory stream so that BOUNDSHEET offsets
//! can be patched once the worksheet substreams have been laid out.

use super::records;
use super::strings::{char_count, encode_chars};
use super::MAX_RECORD_DATA;

/// Growable BIFF8 stream
#[derive(Debug, Default)]
pub struct BiffWriter {
    buf: Vec<u8>,
}

impl BiffWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stream offset, i.e. where the next record header will go
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    fn header(&mut self, record_type: u16, len: usize) {
        self.buf.extend_from_slice(&record_type.to_le_bytes());
        self.buf.extend_from_slice(&(len as u16).to_le_bytes());
    }

    /// Append a record. Bodies over the BIFF8 limit spill into CONTINUE records.
    pub fn record(&mut self, record_type: u16, body: &[u8]) {
        let mut chunks = body.chunks(MAX_RECORD_DATA);
        let first = chunks.next().unwrap_or(&[]);
        self.header(record_type, first.len());
        self.buf.extend_from_slice(first);
        for chunk in chunks {
            self.header(records::CONTINUE, chunk.len());
            self.buf.extend_from_slice(chunk);
        }
    }

    /// Append bytes that already are complete records
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a LABEL cell with its text inline.
    ///
    /// Text that overflows the record continues in CONTINUE records, each
    /// starting with a repeated flags byte as in the SST.
    pub fn label(&mut self, row: u16, col: u16, xf: u16, text: &str) {
        let (wide, bytes) = encode_chars(text);
        let flags = if wide { 0x01 } else { 0x00 };
        let unit = if wide { 2 } else { 1 };

        let mut body = Vec::with_capacity(9 + bytes.len().min(MAX_RECORD_DATA));
        for v in [row, col, xf, char_count(text) as u16] {
            body.extend_from_slice(&v.to_le_bytes());
        }
        body.push(flags);

        let mut record_type = records::LABEL;
        let mut rest = bytes.as_slice();
        loop {
            let room = (MAX_RECORD_DATA - body.len()) / unit * unit;
            let take = room.min(rest.len());
            body.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            self.header(record_type, body.len());
            self.buf.extend_from_slice(&body);
            if rest.is_empty() {
                break;
            }
            record_type = records::CONTINUE;
            body.clear();
            body.push(flags);
        }
    }

    /// Overwrite four bytes at an absolute stream offset
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        if let Some(slot) = self.buf.get_mut(at..at + 4) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Append the shared string table.
    ///
    /// A string header never straddles two records. When character data
    /// overflows, the CONTINUE record starts with a repeated flags byte.
    pub fn sst<S: AsRef<str>>(&mut self, total_refs: u32, strings: &[S]) {
        let mut bodies: Vec<Vec<u8>> = Vec::new();
        let mut current = Vec::with_capacity(MAX_RECORD_DATA);
        current.extend_from_slice(&total_refs.to_le_bytes());
        current.extend_from_slice(&(strings.len() as u32).to_le_bytes());

        for s in strings {
            let s = s.as_ref();
            let (wide, bytes) = encode_chars(s);
            let flags = if wide { 0x01 } else { 0x00 };
            let unit = if wide { 2 } else { 1 };

            if current.len() + 3 + unit.min(bytes.len()) > MAX_RECORD_DATA {
                bodies.push(std::mem::replace(
                    &mut current,
                    Vec::with_capacity(MAX_RECORD_DATA),
                ));
            }
            current.extend_from_slice(&(char_count(s) as u16).to_le_bytes());
            current.push(flags);

            let mut rest = bytes.as_slice();
            loop {
                let room = (MAX_RECORD_DATA - current.len()) / unit * unit;
                let take = room.min(rest.len());
                current.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
                if rest.is_empty() {
                    break;
                }
                bodies.push(std::mem::replace(
                    &mut current,
                    Vec::with_capacity(MAX_RECORD_DATA),
                ));
                current.push(flags);
            }
        }
        bodies.push(current);

        for (i, body) in bodies.iter().enumerate() {
            let record_type = if i == 0 { records::SST } else { records::CONTINUE };
            self.header(record_type, body.len());
            self.buf.extend_from_slice(body);
        }
    }

    /// Zero-fill the stream up to `len` bytes
    pub fn pad_to(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::read_all_records;
    use crate::biff::strings::{parse_sst, read_continued_string};
    use std::io::Cursor;

    #[test]
    fn test_record_layout_and_patch() {
        let mut w = BiffWriter::new();
        w.record(records::EOF, &[]);
        let at = w.position() + 4;
        w.record(records::BOUNDSHEET, &[0; 6]);
        w.patch_u32(at, 0xDEADBEEF);

        let bytes = w.into_inner();
        assert_eq!(&bytes[..4], &[0x0A, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &0xDEADBEEFu32.to_le_bytes());
    }

    #[test]
    fn test_large_record_is_continued() {
        let body = vec![7u8; MAX_RECORD_DATA + 10];
        let mut w = BiffWriter::new();
        w.record(records::MERGECELLS, &body);

        let recs = read_all_records(&mut Cursor::new(w.into_inner())).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].data, body);
        assert_eq!(recs[0].continues, vec![MAX_RECORD_DATA]);
    }

    #[test]
    fn test_sst_spanning_continue_reads_back() {
        let long_latin = "x".repeat(9000);
        let long_wide = "名".repeat(5000);
        let strings = vec!["a".to_string(), long_latin, long_wide, "tail".to_string()];

        let mut w = BiffWriter::new();
        w.sst(7, &strings);

        let recs = read_all_records(&mut Cursor::new(w.into_inner())).unwrap();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].continues.len() >= 2);
        assert_eq!(parse_sst(&recs[0]).unwrap(), strings);
    }

    #[test]
    fn test_long_label_reads_back() {
        let text = "名单".repeat(3000);
        let mut w = BiffWriter::new();
        w.label(3, 1, 15, &text);
        w.label(4, 1, 15, "short");

        let recs = read_all_records(&mut Cursor::new(w.into_inner())).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].record_type, records::LABEL);
        assert_eq!(recs[0].continues.len(), 1);

        let mut offset = 6;
        assert_eq!(read_continued_string(&recs[0], &mut offset).unwrap(), text);
        let mut offset = 6;
        assert_eq!(read_continued_string(&recs[1], &mut offset).unwrap(), "short");
    }
}
