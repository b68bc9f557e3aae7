//! Date parsing and formatting for date-typed fields
//!
//! Reading tries each accepted input pattern in turn, first as a date-time
//! and then as a bare date. Plain numbers are taken as spreadsheet serials,
//! which is what a date cell without a date format looks like as text.

use std::fmt::Write;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rowbind_core::serial;

use crate::error::CoerceError;
use crate::options::MapperOptions;
use crate::record::{FieldKind, FieldValue};

/// Parse cell text into a date-time using the accepted input patterns
pub fn parse_datetime(
    text: &str,
    options: &MapperOptions,
    date_1904: bool,
) -> Result<NaiveDateTime, CoerceError> {
    for pattern in &options.date_input_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Ok(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, pattern) {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }

    text.parse::<f64>()
        .ok()
        .and_then(|n| serial::serial_to_datetime(n, date_1904))
        .ok_or_else(|| CoerceError::InvalidDate(text.to_string()))
}

/// Parse cell text into a value of the given date kind.
///
/// Blank text is [`FieldValue::Null`]; whether that is acceptable is up to
/// the field.
pub fn parse_date(
    text: &str,
    kind: FieldKind,
    options: &MapperOptions,
    date_1904: bool,
) -> Result<FieldValue, CoerceError> {
    let text = if options.trim_cells { text.trim() } else { text };
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }

    let dt = parse_datetime(text, options, date_1904)?;
    match kind {
        FieldKind::Date => Ok(FieldValue::Date(dt.date())),
        FieldKind::DateTime => Ok(FieldValue::DateTime(dt)),
        other => Err(CoerceError::KindMismatch {
            expected: other,
            found: "date",
        }),
    }
}

fn format_with<D: std::fmt::Display>(value: D, pattern: &str) -> Result<String, CoerceError> {
    let mut out = String::new();
    write!(out, "{value}").map_err(|_| CoerceError::InvalidPattern(pattern.to_string()))?;
    Ok(out)
}

/// Render a date field for writing. Null renders as an empty string.
pub fn format_date(value: &FieldValue, options: &MapperOptions) -> Result<String, CoerceError> {
    match value {
        FieldValue::Null => Ok(String::new()),
        FieldValue::Date(d) => format_with(d.format(&options.date_format), &options.date_format),
        FieldValue::DateTime(dt) => format_with(
            dt.format(&options.datetime_format),
            &options.datetime_format,
        ),
        other => Err(CoerceError::KindMismatch {
            expected: FieldKind::Date,
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_accepted_patterns() {
        let opts = MapperOptions::default();
        for text in ["2020-01-01", "2020/01/01", "2020.01.01", " 2020-1-1 "] {
            assert_eq!(
                parse_date(text, FieldKind::Date, &opts, false),
                Ok(FieldValue::Date(ymd(2020, 1, 1))),
                "{text}"
            );
        }
        assert_eq!(
            parse_date("2020-01-01 06:30", FieldKind::DateTime, &opts, false),
            Ok(FieldValue::DateTime(ymd(2020, 1, 1).and_hms_opt(6, 30, 0).unwrap()))
        );
        assert_eq!(
            parse_date("2020/01/01 06:30:15", FieldKind::Date, &opts, false),
            Ok(FieldValue::Date(ymd(2020, 1, 1)))
        );
    }

    #[test]
    fn test_serial_text() {
        let opts = MapperOptions::default();
        assert_eq!(
            parse_date("43831", FieldKind::Date, &opts, false),
            Ok(FieldValue::Date(ymd(2020, 1, 1)))
        );
        assert_eq!(
            parse_date("43831.25", FieldKind::DateTime, &opts, false),
            Ok(FieldValue::DateTime(ymd(2020, 1, 1).and_hms_opt(6, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let opts = MapperOptions::default();
        assert_eq!(
            parse_date("01/13/2020", FieldKind::Date, &opts, false),
            Err(CoerceError::InvalidDate("01/13/2020".into()))
        );
        assert_eq!(parse_date("  ", FieldKind::Date, &opts, false), Ok(FieldValue::Null));
    }

    #[test]
    fn test_format() {
        let opts = MapperOptions::default();
        let d = ymd(2020, 1, 1);
        assert_eq!(format_date(&FieldValue::Date(d), &opts).unwrap(), "2020-01-01");
        assert_eq!(
            format_date(&FieldValue::DateTime(d.and_hms_opt(8, 5, 0).unwrap()), &opts).unwrap(),
            "2020-01-01 08:05:00"
        );
        assert_eq!(format_date(&FieldValue::Null, &opts).unwrap(), "");

        let custom = MapperOptions::new().with_date_format("%d.%m.%Y");
        assert_eq!(format_date(&FieldValue::Date(d), &custom).unwrap(), "01.01.2020");
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let opts = MapperOptions::new().with_date_format("%Y-%");
        let err = format_date(&FieldValue::Date(ymd(2020, 1, 1)), &opts).unwrap_err();
        assert_eq!(err, CoerceError::InvalidPattern("%Y-%".into()));
    }
}
