//! # sheetmerge
//!
//! Merge same-named worksheets from many Excel workbooks into one summary
//! workbook.
//!
//! Every selected worksheet name becomes one output sheet holding the rows of
//! that worksheet from each input file, in file order. A final
//! "合并总表" sheet stacks all merged sheets. Two provenance columns,
//! "文件" (file name) and "表名" (worksheet name), lead every row.
//!
//! ## Features
//!
//! - Read `.xlsx`, `.xlsm` and legacy `.xls` (BIFF8) workbooks
//! - Restrict reads to an A1-style block such as `B2`..`D10`
//! - Optional header row, with columns unioned across files
//! - A [`MergeReport`] of skipped files and empty names
//!
//! ## Example
//!
//! ```rust,no_run
//! use sheetmerge::prelude::*;
//!
//! let files = vec![
//!     SourceFile::open("一月.xlsx")?,
//!     SourceFile::open("二月.xlsx")?,
//! ];
//! let sheets = sheetmerge::first_file_sheets(&files)?;
//!
//! let options = MergeOptions { header: true, ..Default::default() };
//! let outcome = merge(&files, &sheets, &RangeInput::new("A1", "D20"), &options)?;
//! outcome.save(OUTPUT_FILE_NAME)?;
//! # Ok::<(), sheetmerge::Error>(())
//! ```

pub mod error;
pub mod extract;
pub mod merge;
pub mod prelude;
pub mod range;
pub mod source;
pub mod table;

pub use error::{Error, Result};
pub use extract::{extract, SheetReadError, SheetReadErrorKind};
pub use merge::{merge, MergeOptions, MergeOutcome, MergeReport, MergedSheet, SkippedRead};
pub use range::{RangeFormatError, RangeInput, ReadSpec};
pub use source::{SourceFile, SourceFormat};
pub use table::{ColumnLabel, SchemaMismatch, SchemaPolicy, Table};

// Re-export the cell model and codecs
pub use sheetmerge_core::{CellAddress, CellValue, Workbook, Worksheet};
pub use sheetmerge_xls::{XlsError, XlsReader};
pub use sheetmerge_xlsx::{XlsxError, XlsxReader, XlsxWriter};

/// Default file name of the merged workbook
pub const OUTPUT_FILE_NAME: &str = "表格汇总.xlsx";

/// Name of the sheet stacking every merged sheet
pub const COMBINED_SHEET_NAME: &str = "合并总表";

/// Provenance column holding the source file name
pub const FILE_COLUMN: &str = "文件";

/// Provenance column holding the source worksheet name
pub const SHEET_COLUMN: &str = "表名";

/// Worksheet names of the first file, the names offered for selection.
///
/// No files means no names.
pub fn first_file_sheets(files: &[SourceFile]) -> Result<Vec<String>> {
    match files.first() {
        Some(file) => file.sheet_names(),
        None => Ok(Vec::new()),
    }
}
