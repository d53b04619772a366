//! Prelude module - common imports for sheetmerge users
//!
//! ```rust
//! use sheetmerge::prelude::*;
//! ```

pub use crate::{
    // Merge entry points
    merge,
    MergeOptions,
    MergeOutcome,
    MergeReport,
    RangeInput,
    SchemaPolicy,
    SourceFile,

    // Tables
    ColumnLabel,
    Table,

    // Error types
    Error,
    Result,

    // Constants
    COMBINED_SHEET_NAME,
    OUTPUT_FILE_NAME,
};
