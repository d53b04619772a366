//! Reading one worksheet of one file into a [`Table`]

use std::collections::HashMap;
use std::ops::Range;

use sheetmerge_core::Worksheet;
use sheetmerge_xls::XlsError;
use sheetmerge_xlsx::XlsxError;
use thiserror::Error;

use crate::range::ReadSpec;
use crate::source::SourceFile;
use crate::table::{ColumnLabel, Table};
use crate::{FILE_COLUMN, SHEET_COLUMN};

/// Why a worksheet of a file could not be read
#[derive(Debug, Error)]
pub enum SheetReadErrorKind {
    /// The file has no worksheet of that name
    #[error("worksheet not found")]
    SheetNotFound,

    /// The XLSX/XLSM container could not be decoded
    #[error(transparent)]
    Xlsx(#[from] XlsxError),

    /// The XLS container could not be decoded
    #[error(transparent)]
    Xls(#[from] XlsError),

    /// The read window holds no rows
    #[error("no data in the selected range")]
    NoData,

    /// The column window is wider than the data
    #[error("columns up to {requested} requested but the data has {available}")]
    ColumnsOutOfBounds { requested: usize, available: usize },

    /// A header cell reuses a provenance column name
    #[error("header already contains a '{0}' column")]
    DuplicateColumn(String),
}

/// A skipped (file, worksheet) read
#[derive(Debug, Error)]
#[error("cannot read worksheet '{sheet}' of '{file}': {kind}")]
pub struct SheetReadError {
    pub file: String,
    pub sheet: String,
    #[source]
    pub kind: SheetReadErrorKind,
}

impl SheetReadError {
    fn new(file: &SourceFile, sheet: &str, kind: SheetReadErrorKind) -> Self {
        Self {
            file: file.name().to_string(),
            sheet: sheet.to_string(),
            kind,
        }
    }
}

/// Read `sheet` of `file` through the `spec` window.
///
/// The returned table starts with the "文件" and "表名" provenance columns,
/// filled with the file name and worksheet name on every row.
pub fn extract(
    file: &SourceFile,
    sheet: &str,
    spec: &ReadSpec,
    header: bool,
) -> Result<Table, SheetReadError> {
    let worksheet = file
        .read_worksheet(sheet)
        .map_err(|kind| SheetReadError::new(file, sheet, kind))?;

    let table = table_from_worksheet(&worksheet, file.name(), spec, header)
        .map_err(|kind| SheetReadError::new(file, sheet, kind))?;

    log::debug!(
        "'{}' / '{}': {} rows x {} columns",
        file.name(),
        sheet,
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

type TextRow = Vec<Option<String>>;

pub(crate) fn table_from_worksheet(
    worksheet: &Worksheet,
    file_name: &str,
    spec: &ReadSpec,
    header: bool,
) -> Result<Table, SheetReadErrorKind> {
    let grid = text_grid(worksheet);

    let take = spec
        .nrows
        .map_or(usize::MAX, |n| (n as usize).saturating_add(header as usize));
    let window: Vec<&TextRow> = grid.iter().skip(spec.skiprows as usize).take(take).collect();

    let width = window.iter().map(|row| row.len()).max().unwrap_or(0);
    if width == 0 {
        return Err(SheetReadErrorKind::NoData);
    }

    let columns: Range<usize> = match &spec.usecols {
        Some(cols) if cols.end as usize > width => {
            return Err(SheetReadErrorKind::ColumnsOutOfBounds {
                requested: cols.end as usize,
                available: width,
            })
        }
        Some(cols) => cols.start as usize..cols.end as usize,
        None => 0..width,
    };

    let (labels, data) = match window.split_first() {
        Some((first, rest)) if header => (header_labels(first, width, columns.clone())?, rest),
        _ => (
            columns.clone().map(|c| ColumnLabel::Index(c as u16)).collect(),
            &window[..],
        ),
    };

    let sheet = worksheet.name();
    let mut all_labels = Vec::with_capacity(labels.len() + 2);
    all_labels.push(ColumnLabel::name(FILE_COLUMN));
    all_labels.push(ColumnLabel::name(SHEET_COLUMN));
    all_labels.extend(labels);

    let mut table = Table::new(all_labels);
    for row in data {
        let mut cells = Vec::with_capacity(columns.len() + 2);
        cells.push(Some(file_name.to_string()));
        cells.push(Some(sheet.to_string()));
        cells.extend(columns.clone().map(|c| row.get(c).cloned().flatten()));
        table.push_row(cells);
    }
    Ok(table)
}

/// Every cell as text, with trailing blank rows dropped
fn text_grid(worksheet: &Worksheet) -> Vec<TextRow> {
    let mut grid: Vec<TextRow> = worksheet
        .dense_rows()
        .into_iter()
        .map(|row| {
            let mut cells: TextRow = row
                .iter()
                .map(|value| Some(value.to_text()).filter(|text| !text.is_empty()))
                .collect();
            while matches!(cells.last(), Some(None)) {
                cells.pop();
            }
            cells
        })
        .collect();

    while matches!(grid.last(), Some(row) if row.is_empty()) {
        grid.pop();
    }
    grid
}

/// Column names from a header row.
///
/// The whole row is named before `columns` is applied: blank cells become
/// `Unnamed: {c}` with `c` the sheet column, and repeated names get `.1`,
/// `.2`, ... suffixes in row order. A suffixed name that is itself taken gets
/// suffixed again.
fn header_labels(
    row: &TextRow,
    width: usize,
    columns: Range<usize>,
) -> Result<Vec<ColumnLabel>, SheetReadErrorKind> {
    let names: Vec<String> = (0..width)
        .map(|c| match row.get(c).cloned().flatten() {
            Some(name) => name,
            None => format!("Unnamed: {}", c),
        })
        .collect();

    let mut names = dedup_names(names);
    names.truncate(columns.end);
    let names = names.split_off(columns.start);

    if let Some(name) = names
        .iter()
        .find(|name| name.as_str() == FILE_COLUMN || name.as_str() == SHEET_COLUMN)
    {
        return Err(SheetReadErrorKind::DuplicateColumn(name.clone()));
    }

    Ok(names.into_iter().map(ColumnLabel::Name).collect())
}

fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(names.len());

    for mut name in names {
        let mut count = counts.get(&name).copied().unwrap_or(0);
        while count > 0 {
            counts.insert(name.clone(), count + 1);
            name = format!("{}.{}", name, count);
            count = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), count + 1);
        out.push(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetmerge_core::CellValue;

    fn sheet(rows: &[&[&str]]) -> Worksheet {
        let mut ws = Worksheet::new("Sheet1");
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                ws.set_cell_value_at(r as u32, c as u16, *text).unwrap();
            }
        }
        ws
    }

    fn text_rows(table: &Table) -> Vec<Vec<String>> {
        table
            .rows()
            .iter()
            .map(|row| row.iter().map(|c| c.clone().unwrap_or_default()).collect())
            .collect()
    }

    fn labels(table: &Table) -> Vec<String> {
        table.columns().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_full_read_without_header() {
        let ws = sheet(&[&["a", "b"], &["1", "2"], &["3", "4"]]);
        let table = table_from_worksheet(&ws, "f.xlsx", &ReadSpec::full(), false).unwrap();

        assert_eq!(labels(&table), vec!["文件", "表名", "0", "1"]);
        assert_eq!(table.columns()[2], ColumnLabel::Index(0));
        assert_eq!(
            text_rows(&table),
            vec![
                vec!["f.xlsx", "Sheet1", "a", "b"],
                vec!["f.xlsx", "Sheet1", "1", "2"],
                vec!["f.xlsx", "Sheet1", "3", "4"],
            ]
        );
    }

    #[test]
    fn test_header_row_not_counted_in_nrows() {
        let ws = sheet(&[
            &["x", "x", "x", "x"],
            &["x", "名称", "数量", "x"],
            &["x", "苹果", "3", "x"],
            &["x", "梨", "5", "x"],
            &["x", "桃", "7", "x"],
            &["x", "枣", "9", "x"],
        ]);
        let spec = ReadSpec::parse("B2", "C4").unwrap();
        let table = table_from_worksheet(&ws, "f.xlsx", &spec, true).unwrap();

        assert_eq!(labels(&table), vec!["文件", "表名", "名称", "数量"]);
        assert_eq!(
            text_rows(&table),
            vec![
                vec!["f.xlsx", "Sheet1", "苹果", "3"],
                vec!["f.xlsx", "Sheet1", "梨", "5"],
                vec!["f.xlsx", "Sheet1", "桃", "7"],
            ]
        );
    }

    #[test]
    fn test_absolute_indices_without_header() {
        let ws = sheet(&[&["a", "b", "c"], &["d", "e", "f"]]);
        let spec = ReadSpec::parse("B1", "C1").unwrap();
        let table = table_from_worksheet(&ws, "f.xlsx", &spec, false).unwrap();

        assert_eq!(
            &table.columns()[2..],
            &[ColumnLabel::Index(1), ColumnLabel::Index(2)]
        );
        assert_eq!(text_rows(&table), vec![vec!["f.xlsx", "Sheet1", "b", "c"]]);
    }

    #[test]
    fn test_single_cell_window() {
        let ws = sheet(&[&["a", "b"], &["c", "d"]]);
        let spec = ReadSpec::parse("A1", "").unwrap();
        let table = table_from_worksheet(&ws, "f.xlsx", &spec, false).unwrap();
        assert_eq!(text_rows(&table), vec![vec!["f.xlsx", "Sheet1", "a"]]);
    }

    #[test]
    fn test_blank_rows() {
        let mut ws = sheet(&[&["a"], &[], &["b"]]);
        ws.set_cell_value("A6", "").unwrap();
        ws.set_cell_value("B8", CellValue::string("")).unwrap();

        let table = table_from_worksheet(&ws, "f.xlsx", &ReadSpec::full(), false).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[1][2], None);
    }

    #[test]
    fn test_no_data() {
        let empty = Worksheet::new("Sheet1");
        assert!(matches!(
            table_from_worksheet(&empty, "f.xlsx", &ReadSpec::full(), true),
            Err(SheetReadErrorKind::NoData)
        ));

        let ws = sheet(&[&["a"], &["b"]]);
        let spec = ReadSpec::parse("A5", "A9").unwrap();
        assert!(matches!(
            table_from_worksheet(&ws, "f.xlsx", &spec, false),
            Err(SheetReadErrorKind::NoData)
        ));
    }

    #[test]
    fn test_header_only_gives_empty_table() {
        let ws = sheet(&[&["a", "b"]]);
        let table = table_from_worksheet(&ws, "f.xlsx", &ReadSpec::full(), true).unwrap();
        assert_eq!(labels(&table), vec!["文件", "表名", "a", "b"]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_columns_out_of_bounds() {
        let ws = sheet(&[&["a", "b"], &["c"]]);
        let spec = ReadSpec::parse("A1", "D2").unwrap();
        assert!(matches!(
            table_from_worksheet(&ws, "f.xlsx", &spec, false),
            Err(SheetReadErrorKind::ColumnsOutOfBounds {
                requested: 4,
                available: 2
            })
        ));
    }

    #[test]
    fn test_unnamed_and_duplicate_headers() {
        let mut ws = sheet(&[&["x", "", "x", "x.1", "x"], &["1", "2", "3", "4", "5"]]);
        ws.set_cell_value("F1", "").unwrap();
        ws.set_cell_value("F2", "6").unwrap();

        let table = table_from_worksheet(&ws, "f.xlsx", &ReadSpec::full(), true).unwrap();
        assert_eq!(
            labels(&table),
            vec!["文件", "表名", "x", "Unnamed: 1", "x.1", "x.1.1", "x.2", "Unnamed: 5"]
        );
    }

    #[test]
    fn test_header_names_use_whole_row() {
        let ws = sheet(&[&["x", "", "x", "", "y"], &["1", "2", "3", "4", "5"]]);

        // Columns C:D: the second "x" and the blank at sheet column 3
        let spec = ReadSpec::parse("C1", "D2").unwrap();
        let table = table_from_worksheet(&ws, "f.xlsx", &spec, true).unwrap();
        assert_eq!(labels(&table), vec!["文件", "表名", "x.1", "Unnamed: 3"]);
        assert_eq!(text_rows(&table), vec![vec!["f.xlsx", "Sheet1", "3", "4"]]);
    }

    #[test]
    fn test_dedup_names() {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            dedup_names(names(&["a", "a", "a", "b"])),
            names(&["a", "a.1", "a.2", "b"])
        );
        assert_eq!(
            dedup_names(names(&["a.1", "a", "a"])),
            names(&["a.1", "a", "a.1.1"])
        );
    }

    #[test]
    fn test_provenance_name_in_header() {
        let ws = sheet(&[&["编号", "文件"], &["1", "a.xlsx"]]);
        assert!(matches!(
            table_from_worksheet(&ws, "f.xlsx", &ReadSpec::full(), true),
            Err(SheetReadErrorKind::DuplicateColumn(name)) if name == "文件"
        ));

        // Without a header the row is plain data
        assert!(table_from_worksheet(&ws, "f.xlsx", &ReadSpec::full(), false).is_ok());
    }

    #[test]
    fn test_values_become_text() {
        let mut ws = Worksheet::new("数据");
        ws.set_cell_value("A1", 5.0).unwrap();
        ws.set_cell_value("B1", 3.25).unwrap();
        ws.set_cell_value("C1", true).unwrap();
        ws.set_cell_value("D1", CellValue::DateTime(45306.5)).unwrap();

        let table = table_from_worksheet(&ws, "f.xls", &ReadSpec::full(), false).unwrap();
        assert_eq!(
            text_rows(&table),
            vec![vec!["f.xls", "数据", "5", "3.25", "True", "2024-01-15 12:00:00"]]
        );
    }
}
