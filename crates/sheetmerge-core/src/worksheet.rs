//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
///
/// Cells are stored sparsely, row by row. Storing [`CellValue::Empty`]
/// removes the cell.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Row index -> column map
    rows: BTreeMap<u32, BTreeMap<u16, CellValue>>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Get a cell value by A1 address
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get a cell value by row/column (0-based)
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col).cloned().unwrap_or_default()
    }

    /// Borrow a stored cell value, if any
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.rows.get(&row).and_then(|cells| cells.get(&col))
    }

    /// Set a cell value by A1 address
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row/column (0-based)
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col as u32, MAX_COLS - 1));
        }

        let value = value.into();
        if value.is_empty() {
            if let Some(cells) = self.rows.get_mut(&row) {
                cells.remove(&col);
                if cells.is_empty() {
                    self.rows.remove(&row);
                }
            }
        } else {
            self.rows.entry(row).or_default().insert(col, value);
        }
        Ok(())
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// Check whether the sheet holds no cells
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the smallest range covering every non-empty cell
    pub fn used_range(&self) -> Option<CellRange> {
        let (&min_row, _) = self.rows.first_key_value()?;
        let (&max_row, _) = self.rows.last_key_value()?;

        let mut min_col = u16::MAX;
        let mut max_col = 0;
        for cells in self.rows.values() {
            if let (Some((&first, _)), Some((&last, _))) =
                (cells.first_key_value(), cells.last_key_value())
            {
                min_col = min_col.min(first);
                max_col = max_col.max(last);
            }
        }

        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    /// Iterate over non-empty cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.rows
            .iter()
            .flat_map(|(&row, cells)| cells.iter().map(move |(&col, value)| (row, col, value)))
    }

    /// Materialise rows `0..=last used row` as dense vectors.
    ///
    /// Each row is as long as its own last non-empty cell; blank rows
    /// between data are returned as empty vectors.
    pub fn dense_rows(&self) -> Vec<Vec<CellValue>> {
        let Some((&last_row, _)) = self.rows.last_key_value() else {
            return Vec::new();
        };

        let mut out = vec![Vec::new(); last_row as usize + 1];
        for (&row, cells) in &self.rows {
            let dense = &mut out[row as usize];
            for (&col, value) in cells {
                let col = col as usize;
                if dense.len() <= col {
                    dense.resize(col + 1, CellValue::Empty);
                }
                dense[col] = value.clone();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_get() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value("B2", "x").unwrap();
        ws.set_cell_value_at(0, 0, 1.5).unwrap();

        assert_eq!(ws.get_value("B2").unwrap(), CellValue::string("x"));
        assert_eq!(ws.get_value_at(0, 0), CellValue::Number(1.5));
        assert_eq!(ws.get_value_at(9, 9), CellValue::Empty);
        assert_eq!(ws.cell_count(), 2);
    }

    #[test]
    fn test_setting_empty_removes_cell() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value("A1", "x").unwrap();
        ws.set_cell_value("A1", CellValue::Empty).unwrap();
        assert!(ws.is_empty());
        assert_eq!(ws.used_range(), None);
    }

    #[test]
    fn test_bounds() {
        let mut ws = Worksheet::new("Data");
        assert!(ws.set_cell_value_at(MAX_ROWS, 0, 1.0).is_err());
        assert!(ws.set_cell_value_at(0, MAX_COLS, 1.0).is_err());
    }

    #[test]
    fn test_used_range() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value("C2", 1.0).unwrap();
        ws.set_cell_value("B5", 2.0).unwrap();
        assert_eq!(ws.used_range().unwrap().to_string(), "B2:C5");
    }

    #[test]
    fn test_dense_rows() {
        let mut ws = Worksheet::new("Data");
        ws.set_cell_value("A1", "a").unwrap();
        ws.set_cell_value("C1", "c").unwrap();
        ws.set_cell_value("B3", "b").unwrap();

        let rows = ws.dense_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            vec![CellValue::string("a"), CellValue::Empty, CellValue::string("c")]
        );
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec![CellValue::Empty, CellValue::string("b")]);
    }
}
