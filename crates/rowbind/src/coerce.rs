//! Conversion between cell text and non-date field values

use rowbind_core::cell::format_number;

use crate::error::CoerceError;
use crate::options::MapperOptions;
use crate::record::{FieldKind, FieldValue};

fn parse_integer(text: &str) -> Result<FieldValue, CoerceError> {
    if let Ok(n) = text.parse::<i128>() {
        return Ok(FieldValue::Integer(n));
    }
    // integral numbers written as "42.0" or "1e3"
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e36 => {
            Ok(FieldValue::Integer(f as i128))
        }
        _ => Err(CoerceError::InvalidNumber {
            text: text.to_string(),
            kind: FieldKind::Integer,
        }),
    }
}

fn parse_bool(text: &str) -> Result<FieldValue, CoerceError> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Ok(FieldValue::Bool(true))
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Ok(FieldValue::Bool(false))
    } else {
        Err(CoerceError::InvalidBool(text.to_string()))
    }
}

/// Convert cell text into a value of a non-date kind.
///
/// Text fields take the cell text verbatim. For every other kind the text
/// is trimmed first (unless disabled) and blank text becomes
/// [`FieldValue::Null`].
pub fn parse_value(
    text: &str,
    kind: FieldKind,
    options: &MapperOptions,
) -> Result<FieldValue, CoerceError> {
    if kind == FieldKind::Text {
        return Ok(FieldValue::Text(text.to_string()));
    }

    let text = if options.trim_cells { text.trim() } else { text };
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }

    match kind {
        FieldKind::Integer => parse_integer(text),
        FieldKind::Float => text
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| CoerceError::InvalidNumber {
                text: text.to_string(),
                kind,
            }),
        FieldKind::Bool => parse_bool(text),
        FieldKind::Text | FieldKind::Date | FieldKind::DateTime => {
            Err(CoerceError::KindMismatch {
                expected: kind,
                found: "text",
            })
        }
    }
}

/// Render a non-date field value as cell text. Null renders as an empty string.
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Float(f) => format_number(*f),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Date(d) => d.to_string(),
        FieldValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}
