//! # sheetmerge-xls
//!
//! XLS (BIFF8) reader for sheetmerge.
//!
//! This crate handles the legacy Excel binary format (.xls). Only cell
//! values are decoded; number formats are consulted just far enough to tell
//! dates from plain numbers.

pub mod biff;
pub mod error;
pub mod reader;

mod styles;

pub use error::{XlsError, XlsResult};
pub use reader::XlsReader;
