//! # sheetmerge-xlsx
//!
//! XLSX/XLSM (Office Open XML) reader and writer for sheetmerge.
//!
//! The reader can list sheet names and decode a single named sheet without
//! touching the others. The writer emits plain cell data with inline strings.

pub mod error;
pub mod reader;
pub mod writer;

mod styles;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use writer::XlsxWriter;
