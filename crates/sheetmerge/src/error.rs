//! Error types for sheetmerge

use thiserror::Error;

use crate::range::RangeFormatError;
use crate::table::SchemaMismatch;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a merge run.
///
/// Failures reading one worksheet of one file are not in here; they are
/// recovered as [`SheetReadError`](crate::SheetReadError) and reported.
#[derive(Debug, Error)]
pub enum Error {
    /// Start/end cell could not be parsed
    #[error("Invalid cell range: {0}")]
    Range(#[from] RangeFormatError),

    /// File extension is not .xlsx, .xlsm or .xls
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Strict schema policy rejected the tables of one worksheet name
    #[error("Worksheet '{sheet}': {source}")]
    SchemaMismatch {
        sheet: String,
        #[source]
        source: SchemaMismatch,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XLSX reading or writing failed
    #[error(transparent)]
    Xlsx(#[from] sheetmerge_xlsx::XlsxError),

    /// XLS reading failed
    #[error(transparent)]
    Xls(#[from] sheetmerge_xls::XlsError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] sheetmerge_core::Error),
}
