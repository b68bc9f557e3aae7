//! Download responses
//!
//! [`RowMapper::write_download`](crate::RowMapper::write_download) only needs
//! to reset a response, set two headers and stream bytes into its body. The
//! [`DownloadResponse`] trait captures exactly that, so any HTTP framework can
//! be plugged in with a small adapter.

use std::io::Write;

use crate::error::{MapError, Result};

/// Content type of a spreadsheet download
pub const DOWNLOAD_CONTENT_TYPE: &str = "application/octet-stream; charset=utf-8";

/// An HTTP response the workbook is streamed into
pub trait DownloadResponse {
    /// Drop status, headers and any body written so far
    fn reset(&mut self);

    fn set_content_type(&mut self, value: &str) -> Result<()>;

    /// Set a header, replacing any previous value
    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;

    fn body(&mut self) -> &mut dyn Write;
}

/// `Content-Disposition` value for an attachment.
///
/// The file name is form-encoded: UTF-8 percent escapes, `+` for a space,
/// and only letters, digits and `.-*_` left as they are.
pub fn attachment_disposition(file_name: &str) -> String {
    let encoded = urlencoding::encode(file_name)
        .replace("%20", "+")
        .replace("%2A", "*")
        .replace('~', "%7E");
    format!("attachment; filename={encoded}")
}

fn header_error(name: &str, message: impl ToString) -> MapError {
    MapError::Header {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// In-memory response, for tests and for frameworks that want the bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResponse {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl DownloadResponse for BufferedResponse {
    fn reset(&mut self) {
        self.headers.clear();
        self.body.clear();
    }

    fn set_content_type(&mut self, value: &str) -> Result<()> {
        self.set_header("Content-Type", value)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
            return Err(header_error(name, "invalid header name"));
        }
        if value.chars().any(|c| c.is_control() && c != '\t') {
            return Err(header_error(name, "control character in value"));
        }
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}

#[cfg(feature = "http")]
impl DownloadResponse for http::Response<Vec<u8>> {
    fn reset(&mut self) {
        *self = http::Response::new(Vec::new());
    }

    fn set_content_type(&mut self, value: &str) -> Result<()> {
        self.set_header(http::header::CONTENT_TYPE.as_str(), value)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let header_name = http::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| header_error(name, e))?;
        let header_value =
            http::header::HeaderValue::from_str(value).map_err(|e| header_error(name, e))?;
        self.headers_mut().insert(header_name, header_value);
        Ok(())
    }

    fn body(&mut self) -> &mut dyn Write {
        self.body_mut()
    }
}
