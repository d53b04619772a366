//! # sheetmerge-core
//!
//! Core data structures shared by the sheetmerge crates.
//!
//! - [`CellValue`] - A decoded cell value and its text form
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing and column letters
//! - [`NumberFormat`] - Date detection for numeric cells
//! - [`Workbook`], [`Worksheet`] - Sparse sheet grids read from or written to files
//!
//! ## Example
//!
//! ```rust
//! use sheetmerge_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::empty();
//! let index = workbook.add_worksheet_with_name("Sheet1").unwrap();
//! let sheet = workbook.worksheet_mut(index).unwrap();
//!
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value_at(1, 0, CellValue::Number(42.0)).unwrap();
//!
//! assert_eq!(sheet.get_value_at(1, 0).to_text(), "42");
//! ```

pub mod cell;
pub mod error;
pub mod number_format;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellError, CellRange, CellValue};
pub use error::{Error, Result};
pub use number_format::NumberFormat;
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
