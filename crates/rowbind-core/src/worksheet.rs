//! Worksheet type

use std::collections::{BTreeMap, BTreeSet};

use crate::cell::{CellAddress, CellData, CellRange, CellStorage, CellValue};
use crate::error::{Error, Result};
use crate::serial;
use crate::style::Style;
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet of a workbook
#[derive(Debug)]
pub struct Worksheet {
    name: String,
    cells: CellStorage,
    visible: bool,
}

impl Worksheet {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
            visible: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename without validation; [`crate::Workbook`] checks uniqueness
    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    // === Cell access ===

    /// Cell by A1 address
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.get(addr.row, addr.col))
    }

    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Value by A1 address, [`CellValue::Empty`] when absent
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Style applied to a cell, `None` for the default style or a missing cell
    pub fn cell_style_at(&self, row: u32, col: u16) -> Option<&Style> {
        match self.cells.get(row, col)?.style_index {
            0 => None,
            idx => self.cells.style_pool().get(idx),
        }
    }

    pub fn style_by_index(&self, style_index: u32) -> Option<&Style> {
        self.cells.style_pool().get(style_index)
    }

    /// Textual view of a cell as a reader of the sheet would see it.
    ///
    /// Numbers under a date format are rendered as `yyyy-mm-dd`, with
    /// ` HH:MM:SS` appended when the serial has a time of day. Missing and
    /// empty cells yield `None`.
    pub fn cell_text(&self, row: u32, col: u16, date_1904: bool) -> Option<String> {
        let cell = self.cells.get(row, col)?;
        let value = cell.value.effective_value();
        match value {
            CellValue::Empty => None,
            CellValue::Number(n) => {
                let is_date = self
                    .style_by_index(cell.style_index)
                    .map_or(false, |s| s.number_format.is_date_format());
                let as_date = if is_date {
                    serial::serial_to_datetime(*n, date_1904)
                } else {
                    None
                };
                Some(match as_date {
                    Some(dt) if serial::has_time_part(*n) => {
                        dt.format("%Y-%m-%d %H:%M:%S").to_string()
                    }
                    Some(dt) => dt.format("%Y-%m-%d").to_string(),
                    None => value.to_string(),
                })
            }
            _ => Some(value.to_string()),
        }
    }

    // === Cell modification ===

    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        self.validate_cell_position(row, col)?;
        self.cells.set_value(row, col, value.into());
        Ok(())
    }

    pub fn set_cell_style(&mut self, address: &str, style: &Style) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_style_at(addr.row, addr.col, style)
    }

    pub fn set_cell_style_at(&mut self, row: u32, col: u16, style: &Style) -> Result<()> {
        self.validate_cell_position(row, col)?;
        let style_index = self.cells.style_pool_mut().get_or_insert(style.clone());
        self.cells.set_style(row, col, style_index);
        Ok(())
    }

    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(row, col);
    }

    // === Rows and ranges ===

    /// Bounds of all stored cells
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    /// A row exists once any cell in it is stored
    pub fn row_exists(&self, row: u32) -> bool {
        self.cells.has_row(row)
    }

    pub fn row_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells.row_indices()
    }

    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &CellData)> {
        self.cells.iter_row(row)
    }

    /// All stored cells in row order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // === Layout ===

    /// Height in points
    pub fn row_height(&self, row: u32) -> f64 {
        self.cells.row_height(row)
    }

    pub fn default_row_height(&self) -> f64 {
        self.cells.default_row_height()
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.cells.set_row_height(row, height);
    }

    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.cells.is_row_hidden(row)
    }

    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        self.cells.set_row_hidden(row, hidden);
    }

    /// Width in characters of the default font
    pub fn column_width(&self, col: u16) -> f64 {
        self.cells.column_width(col)
    }

    pub fn default_column_width(&self) -> f64 {
        self.cells.default_column_width()
    }

    pub fn set_column_width(&mut self, col: u16, width: f64) {
        self.cells.set_column_width(col, width);
    }

    pub fn is_column_hidden(&self, col: u16) -> bool {
        self.cells.is_column_hidden(col)
    }

    pub fn set_column_hidden(&mut self, col: u16, hidden: bool) {
        self.cells.set_column_hidden(col, hidden);
    }

    pub fn custom_row_heights(&self) -> &BTreeMap<u32, f64> {
        self.cells.custom_row_heights()
    }

    pub fn hidden_rows(&self) -> &BTreeSet<u32> {
        self.cells.hidden_rows()
    }

    pub fn custom_column_widths(&self) -> &BTreeMap<u16, f64> {
        self.cells.custom_column_widths()
    }

    pub fn hidden_columns(&self) -> &BTreeSet<u16> {
        self.cells.hidden_columns()
    }

    // === Merged cells ===

    pub fn merged_regions(&self) -> &[CellRange] {
        self.cells.merged_regions()
    }

    /// Merge a range; fails if it overlaps an existing merged region
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        if self
            .cells
            .merged_regions()
            .iter()
            .any(|existing| range.overlaps(existing))
        {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.cells.add_merged_region(*range);
        Ok(())
    }

    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        self.cells.is_merged(row, col)
    }

    fn validate_cell_position(&self, row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cell_values() {
        let mut ws = Worksheet::new("Test");

        ws.set_cell_value("A1", "Hello").unwrap();
        ws.set_cell_value("B1", 42.0).unwrap();
        ws.set_cell_value("C1", true).unwrap();

        assert_eq!(ws.get_value("A1").unwrap().as_text(), Some("Hello"));
        assert_eq!(ws.get_value("B1").unwrap().as_number(), Some(42.0));
        assert_eq!(ws.get_value("C1").unwrap().as_bool(), Some(true));
        assert!(ws.get_value("D1").unwrap().is_empty());
    }

    #[test]
    fn test_bounds_checked() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.set_cell_value_at(MAX_ROWS, 0, 1.0).is_err());
        assert!(ws.set_cell_value_at(0, MAX_COLS, 1.0).is_err());
    }

    #[test]
    fn test_used_range() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.used_range().is_none());

        ws.set_cell_value_at(5, 3, "A").unwrap();
        ws.set_cell_value_at(10, 7, "B").unwrap();

        let range = ws.used_range().unwrap();
        assert_eq!(range.start, CellAddress::new(5, 3));
        assert_eq!(range.end, CellAddress::new(10, 7));
        assert!(ws.row_exists(5));
        assert!(!ws.row_exists(6));
    }

    #[test]
    fn test_cell_text() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_value_at(0, 0, 42.0).unwrap();
        ws.set_cell_value_at(0, 1, 2.5).unwrap();
        ws.set_cell_value_at(0, 2, false).unwrap();
        ws.set_cell_value_at(0, 3, 43831.0).unwrap();
        ws.set_cell_style_at(0, 3, &Style::new().number_format("yyyy-mm-dd"))
            .unwrap();
        ws.set_cell_value_at(0, 4, 43831.25).unwrap();
        ws.set_cell_style_at(0, 4, &Style::new().number_format("yyyy-mm-dd hh:mm"))
            .unwrap();
        ws.set_cell_style_at(0, 5, &Style::new().bold(true)).unwrap();

        assert_eq!(ws.cell_text(0, 0, false).as_deref(), Some("42"));
        assert_eq!(ws.cell_text(0, 1, false).as_deref(), Some("2.5"));
        assert_eq!(ws.cell_text(0, 2, false).as_deref(), Some("FALSE"));
        assert_eq!(ws.cell_text(0, 3, false).as_deref(), Some("2020-01-01"));
        assert_eq!(
            ws.cell_text(0, 4, false).as_deref(),
            Some("2020-01-01 06:00:00")
        );
        // formatting only
        assert_eq!(ws.cell_text(0, 5, false), None);
        assert_eq!(ws.cell_text(9, 9, false), None);
    }

    #[test]
    fn test_merge_cells() {
        let mut ws = Worksheet::new("Test");

        ws.merge_cells(&CellRange::parse("A1:C3").unwrap()).unwrap();
        assert_eq!(ws.merged_regions().len(), 1);
        assert!(ws.is_merged(1, 1));

        assert!(ws.merge_cells(&CellRange::parse("B2:D4").unwrap()).is_err());
    }
}
