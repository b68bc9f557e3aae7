//! Spreadsheet date serials
//!
//! A serial counts days since the workbook epoch; the fraction is the time
//! of day. The 1900 system keeps Lotus' phantom 1900-02-29 (serial 60), so
//! serials before March 1900 are shifted by one day.

use chrono::{Duration, NaiveDate, NaiveDateTime};

const MS_PER_DAY: i64 = 86_400_000;

fn epoch(date_1904: bool, serial_day: i64) -> Option<NaiveDateTime> {
    let date = if date_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else if serial_day < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert a serial to a date-time, rounding to the millisecond.
/// Negative and non-finite serials have no date.
pub fn serial_to_datetime(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let total_ms = (serial * MS_PER_DAY as f64).round();
    if total_ms > i64::MAX as f64 {
        return None;
    }
    let total_ms = total_ms as i64;
    let day = total_ms / MS_PER_DAY;
    let base = epoch(date_1904, day)?;
    base.checked_add_signed(Duration::milliseconds(total_ms))
}

pub fn serial_to_date(serial: f64, date_1904: bool) -> Option<NaiveDate> {
    serial_to_datetime(serial, date_1904).map(|dt| dt.date())
}

/// Convert a date-time to a serial in the given date system
pub fn datetime_to_serial(value: NaiveDateTime, date_1904: bool) -> f64 {
    let mut base = epoch(date_1904, 60);
    if !date_1904 {
        let march_1900 = NaiveDate::from_ymd_opt(1900, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        if march_1900.map_or(false, |m| value < m) {
            base = epoch(false, 0);
        }
    }
    let Some(base) = base else {
        return 0.0;
    };
    let ms = (value - base).num_milliseconds();
    ms as f64 / MS_PER_DAY as f64
}

/// Whether the serial carries a time of day (to the millisecond)
pub fn has_time_part(serial: f64) -> bool {
    let ms = (serial * MS_PER_DAY as f64).round() as i64;
    ms.rem_euclid(MS_PER_DAY) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(serial_to_date(1.0, false), Some(ymd(1900, 1, 1)));
        assert_eq!(serial_to_date(59.0, false), Some(ymd(1900, 2, 28)));
        assert_eq!(serial_to_date(61.0, false), Some(ymd(1900, 3, 1)));
        assert_eq!(serial_to_date(43831.0, false), Some(ymd(2020, 1, 1)));
        assert_eq!(serial_to_date(0.0, true), Some(ymd(1904, 1, 1)));
        assert_eq!(serial_to_date(-1.0, false), None);
    }

    #[test]
    fn test_time_part() {
        let dt = serial_to_datetime(43831.5, false).unwrap();
        assert_eq!(dt, ymd(2020, 1, 1).and_hms_opt(12, 0, 0).unwrap());
        assert!(has_time_part(43831.5));
        assert!(!has_time_part(43831.0));
    }

    #[test]
    fn test_serial_from_datetime() {
        let dt = ymd(2020, 1, 1).and_hms_opt(18, 0, 0).unwrap();
        assert_eq!(datetime_to_serial(dt, false), 43831.75);

        let early = ymd(1900, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(datetime_to_serial(early, false), 1.0);
    }
}
