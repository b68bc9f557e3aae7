//! Number formats

/// How a numeric cell is displayed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    #[default]
    General,

    /// One of the formats every BIFF8 reader knows by ID (1-49)
    BuiltIn(u16),

    /// Format string stored in a FORMAT record
    Custom(String),
}

impl NumberFormat {
    /// 14 - `m/d/yy`, the short date format
    pub const ID_DATE_SHORT: u16 = 14;
    /// 22 - `m/d/yy h:mm`
    pub const ID_DATETIME: u16 = 22;
    /// 49 - `@`
    pub const ID_TEXT: u16 = 49;

    pub fn from_id(id: u16) -> Self {
        if id == 0 {
            NumberFormat::General
        } else {
            NumberFormat::BuiltIn(id)
        }
    }

    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => builtin_format_string(*id).unwrap_or("General"),
            NumberFormat::Custom(s) => s,
        }
    }

    /// Whether numbers under this format are date or time serials
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::General => false,
            NumberFormat::BuiltIn(id) => matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58),
            NumberFormat::Custom(s) => is_date_pattern(s),
        }
    }
}

/// Built-in format strings. IDs 5-8 and 41-44 are currency formats whose
/// text depends on the locale; they resolve to `None`.
pub(crate) fn builtin_format_string(id: u16) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "m/d/yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mm:ss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Date/time placeholders outside quoted literals, escapes and `[...]` sections
fn is_date_pattern(format: &str) -> bool {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    for c in format.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '\\' => escaped = true,
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ if in_brackets => {}
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dates() {
        assert!(NumberFormat::BuiltIn(14).is_date_format());
        assert!(NumberFormat::BuiltIn(22).is_date_format());
        assert!(!NumberFormat::BuiltIn(2).is_date_format());
        assert!(!NumberFormat::General.is_date_format());
        assert_eq!(NumberFormat::from_id(0), NumberFormat::General);
    }

    #[test]
    fn test_custom_dates() {
        assert!(NumberFormat::Custom("yyyy-mm-dd".into()).is_date_format());
        assert!(NumberFormat::Custom("[$-409]h:mm".into()).is_date_format());
        assert!(!NumberFormat::Custom("0.00\" days\"".into()).is_date_format());
        assert!(!NumberFormat::Custom("[Red]0.00".into()).is_date_format());
        assert!(!NumberFormat::Custom("#,##0".into()).is_date_format());
    }
}
