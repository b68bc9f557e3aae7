//! Mapper options

/// Field name that is never mapped, whatever the field spec says
pub const DEFAULT_SKIP_MARKER: &str = "serialVersionUID";

/// Header column width per title character, in 1/256 of a character
pub const DEFAULT_WIDTH_PER_CHAR: u32 = 1000;

/// Patterns tried, in order, when a date field is read from text
pub const DEFAULT_DATE_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

/// Options for reading and writing records
#[derive(Debug, Clone, PartialEq)]
pub struct MapperOptions {
    /// Pattern used to write `NaiveDate` fields (default: `%Y-%m-%d`)
    pub date_format: String,
    /// Pattern used to write `NaiveDateTime` fields (default: `%Y-%m-%d %H:%M:%S`)
    pub datetime_format: String,
    /// Patterns accepted when reading date fields, tried in order
    pub date_input_formats: Vec<String>,
    /// Field name skipped on read and write
    pub skip_marker: Option<String>,
    /// Header column width per title character
    pub width_per_char: u32,
    /// Trim whitespace before converting non-text fields
    pub trim_cells: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            date_input_formats: DEFAULT_DATE_INPUT_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            skip_marker: Some(DEFAULT_SKIP_MARKER.to_string()),
            width_per_char: DEFAULT_WIDTH_PER_CHAR,
            trim_cells: true,
        }
    }
}

impl MapperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_format<S: Into<String>>(mut self, format: S) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn with_datetime_format<S: Into<String>>(mut self, format: S) -> Self {
        self.datetime_format = format.into();
        self
    }

    /// Replace the accepted input patterns
    pub fn with_date_input_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_input_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Set or clear the skipped field name
    pub fn with_skip_marker(mut self, marker: Option<&str>) -> Self {
        self.skip_marker = marker.map(str::to_string);
        self
    }

    pub fn with_width_per_char(mut self, width: u32) -> Self {
        self.width_per_char = width;
        self
    }

    pub fn with_trim_cells(mut self, trim: bool) -> Self {
        self.trim_cells = trim;
        self
    }

    /// Whether a field spec entry names the skip marker
    pub(crate) fn is_skipped(&self, name: &str) -> bool {
        self.skip_marker.as_deref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = MapperOptions::default();
        assert_eq!(opts.date_format, "%Y-%m-%d");
        assert_eq!(opts.width_per_char, 1000);
        assert!(opts.is_skipped("serialVersionUID"));
        assert!(!opts.is_skipped("name"));
        assert_eq!(opts.date_input_formats.len(), 9);
    }

    #[test]
    fn test_builder() {
        let opts = MapperOptions::new()
            .with_skip_marker(None)
            .with_date_format("%d/%m/%Y")
            .with_date_input_formats(["%d/%m/%Y"])
            .with_trim_cells(false);
        assert!(!opts.is_skipped("serialVersionUID"));
        assert_eq!(opts.date_format, "%d/%m/%Y");
        assert_eq!(opts.date_input_formats, vec!["%d/%m/%Y".to_string()]);
        assert!(!opts.trim_cells);
    }
}
