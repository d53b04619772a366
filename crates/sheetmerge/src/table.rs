//! Extracted tables and row-wise concatenation

use std::collections::BTreeSet;
use std::fmt;

use sheetmerge_core::{CellValue, Worksheet};
use thiserror::Error;

/// Column label of a [`Table`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnLabel {
    /// Name taken from a header row, or a provenance column
    Name(String),
    /// 0-based sheet column position, used when there is no header row
    Index(u16),
}

impl ColumnLabel {
    pub fn name<S: Into<String>>(name: S) -> Self {
        ColumnLabel::Name(name.into())
    }

    /// Value written in the output header row
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            ColumnLabel::Name(name) => CellValue::String(name.clone()),
            ColumnLabel::Index(index) => CellValue::Number(*index as f64),
        }
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Name(name) => f.write_str(name),
            ColumnLabel::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for ColumnLabel {
    fn from(name: &str) -> Self {
        ColumnLabel::Name(name.to_string())
    }
}

impl From<u16> for ColumnLabel {
    fn from(index: u16) -> Self {
        ColumnLabel::Index(index)
    }
}

/// How [`Table::concat`] treats differing column sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaPolicy {
    /// Union of columns in first-appearance order; missing cells stay empty
    #[default]
    Union,
    /// Every table must have the same column set as the first one
    Strict,
}

/// Column sets disagree under [`SchemaPolicy::Strict`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("table {index} has different columns (missing: {}, unexpected: {})", join(.missing), join(.unexpected))]
pub struct SchemaMismatch {
    /// Position of the offending table in the input
    pub index: usize,
    /// Columns of the first table absent from this one
    pub missing: Vec<ColumnLabel>,
    /// Columns of this table absent from the first one
    pub unexpected: Vec<ColumnLabel>,
}

fn join(labels: &[ColumnLabel]) -> String {
    if labels.is_empty() {
        return "none".to_string();
    }
    labels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows of text cells under ordered column labels.
///
/// Every row has exactly one cell per column; `None` is an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<ColumnLabel>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<ColumnLabel>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[ColumnLabel] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Append a row, padding or truncating it to the column count
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn column_index(&self, label: &ColumnLabel) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    /// Cell text at `row` under `label`
    pub fn get(&self, row: usize, label: &ColumnLabel) -> Option<&str> {
        let col = self.column_index(label)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Stack tables row-wise.
    ///
    /// Columns are the union of all input columns in first-appearance order
    /// and rows keep their input order. With [`SchemaPolicy::Strict`] every
    /// table must carry the same column set as the first (order ignored).
    pub fn concat<I>(tables: I, policy: SchemaPolicy) -> Result<Table, SchemaMismatch>
    where
        I: IntoIterator<Item = Table>,
    {
        let tables: Vec<Table> = tables.into_iter().collect();

        if policy == SchemaPolicy::Strict {
            if let Some(first) = tables.first() {
                let expected: BTreeSet<&ColumnLabel> = first.columns.iter().collect();
                for (index, table) in tables.iter().enumerate().skip(1) {
                    let actual: BTreeSet<&ColumnLabel> = table.columns.iter().collect();
                    if actual != expected {
                        return Err(SchemaMismatch {
                            index,
                            missing: first
                                .columns
                                .iter()
                                .filter(|c| !actual.contains(c))
                                .cloned()
                                .collect(),
                            unexpected: table
                                .columns
                                .iter()
                                .filter(|c| !expected.contains(c))
                                .cloned()
                                .collect(),
                        });
                    }
                }
            }
        }

        let mut columns: Vec<ColumnLabel> = Vec::new();
        for table in &tables {
            for label in &table.columns {
                if !columns.contains(label) {
                    columns.push(label.clone());
                }
            }
        }

        let mut out = Table::new(columns);
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|label| out.column_index(label))
                .collect();
            for row in table.rows {
                let mut merged = vec![None; out.columns.len()];
                for (cell, &target) in row.into_iter().zip(&mapping) {
                    merged[target] = cell;
                }
                out.rows.push(merged);
            }
        }
        Ok(out)
    }

    /// Render as a worksheet: a header row of labels, then the data rows
    pub fn to_worksheet(&self, name: &str) -> sheetmerge_core::Result<Worksheet> {
        let mut sheet = Worksheet::new(name);
        for (col, label) in self.columns.iter().enumerate() {
            sheet.set_cell_value_at(0, col as u16, label.to_cell_value())?;
        }
        for (row, cells) in self.rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if let Some(text) = cell {
                    sheet.set_cell_value_at(row as u32 + 1, col as u16, text.as_str())?;
                }
            }
        }
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(columns: &[&str], rows: &[&[Option<&str>]]) -> Table {
        let mut t = Table::new(columns.iter().map(|&c| ColumnLabel::from(c)).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.map(String::from)).collect());
        }
        t
    }

    #[test]
    fn test_concat_same_columns() {
        let a = table(&["x", "y"], &[&[Some("1"), Some("2")]]);
        let b = table(&["x", "y"], &[&[Some("3"), None], &[None, Some("4")]]);

        let out = Table::concat(vec![a, b], SchemaPolicy::Union).unwrap();
        assert_eq!(out.columns(), &[ColumnLabel::from("x"), ColumnLabel::from("y")]);
        assert_eq!(out.row_count(), 3);
        assert_eq!(out.get(1, &"x".into()), Some("3"));
        assert_eq!(out.get(2, &"x".into()), None);
        assert_eq!(out.get(2, &"y".into()), Some("4"));
    }

    #[test]
    fn test_concat_union_first_appearance_order() {
        let a = table(&["a", "b"], &[&[Some("a1"), Some("b1")]]);
        let b = table(&["c", "a"], &[&[Some("c2"), Some("a2")]]);

        let out = Table::concat(vec![a, b], SchemaPolicy::Union).unwrap();
        let names: Vec<String> = out.columns().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            out.rows(),
            &[
                vec![Some("a1".to_string()), Some("b1".to_string()), None],
                vec![Some("a2".to_string()), None, Some("c2".to_string())],
            ]
        );
    }

    #[test]
    fn test_concat_disjoint() {
        let a = table(&["a"], &[&[Some("1")], &[Some("2")]]);
        let b = table(&["b"], &[&[Some("3")]]);
        let c = table(&["c"], &[&[Some("4")], &[Some("5")], &[Some("6")]]);

        let out = Table::concat(vec![a, b, c], SchemaPolicy::Union).unwrap();
        assert_eq!(out.column_count(), 3);
        assert_eq!(out.row_count(), 6);
    }

    #[test]
    fn test_concat_empty_input() {
        let out = Table::concat(Vec::new(), SchemaPolicy::Strict).unwrap();
        assert_eq!(out, Table::default());
    }

    #[test]
    fn test_strict_ignores_order() {
        let a = table(&["a", "b"], &[&[Some("1"), Some("2")]]);
        let b = table(&["b", "a"], &[&[Some("3"), Some("4")]]);

        let out = Table::concat(vec![a, b], SchemaPolicy::Strict).unwrap();
        assert_eq!(out.get(1, &"a".into()), Some("4"));
    }

    #[test]
    fn test_strict_mismatch() {
        let a = table(&["a", "b"], &[]);
        let b = table(&["a", "b"], &[]);
        let c = table(&["a", "c"], &[]);

        let err = Table::concat(vec![a, b, c], SchemaPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            SchemaMismatch {
                index: 2,
                missing: vec!["b".into()],
                unexpected: vec!["c".into()],
            }
        );
        assert_eq!(
            err.to_string(),
            "table 2 has different columns (missing: b, unexpected: c)"
        );
    }

    #[test]
    fn test_name_and_index_labels_differ() {
        let a = Table::new(vec![ColumnLabel::Index(1)]);
        let b = Table::new(vec![ColumnLabel::name("1")]);
        let out = Table::concat(vec![a, b], SchemaPolicy::Union).unwrap();
        assert_eq!(out.column_count(), 2);
    }

    #[test]
    fn test_push_row_pads() {
        let mut t = table(&["a", "b", "c"], &[]);
        t.push_row(vec![Some("x".to_string())]);
        assert_eq!(t.rows()[0], vec![Some("x".to_string()), None, None]);
    }

    #[test]
    fn test_to_worksheet() {
        let mut t = Table::new(vec![ColumnLabel::name("文件"), ColumnLabel::Index(2)]);
        t.push_row(vec![Some("a.xlsx".into()), None]);
        t.push_row(vec![Some("b.xlsx".into()), Some("7".into())]);

        let ws = t.to_worksheet("Sheet1").unwrap();
        assert_eq!(ws.name(), "Sheet1");
        assert_eq!(ws.get_value("A1").unwrap(), CellValue::string("文件"));
        assert_eq!(ws.get_value("B1").unwrap(), CellValue::Number(2.0));
        assert_eq!(ws.get_value("A2").unwrap(), CellValue::string("a.xlsx"));
        assert!(ws.get_value("B2").unwrap().is_empty());
        assert_eq!(ws.get_value("B3").unwrap(), CellValue::string("7"));
        assert_eq!(ws.cell_count(), 5);
    }
}
