//! Cell range parsing
//!
//! Turns a pair of A1-style anchors into the read window used by the
//! extractor: which columns to keep, how many leading rows to skip and how
//! many rows to read.

use std::ops::Range;

use sheetmerge_core::CellAddress;
use thiserror::Error;

/// Malformed start/end cell. Fatal to a merge run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeFormatError {
    /// The anchor has no column letters
    #[error("cell '{0}' has no column letters")]
    MissingColumn(String),

    /// The anchor has no row number
    #[error("cell '{0}' has no row number")]
    MissingRow(String),

    /// Row number is zero or past the last sheet row
    #[error("cell '{0}' has an invalid row number")]
    InvalidRow(String),

    /// Column letters are past the last sheet column (XFD)
    #[error("cell '{0}' has an invalid column")]
    InvalidColumn(String),

    /// End lies above or to the left of start
    #[error("range end '{end}' lies before start '{start}'")]
    Reversed { start: String, end: String },
}

/// Start and end cells as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeInput {
    /// Top-left cell, e.g. `A1`. Empty reads the whole sheet.
    pub start: String,
    /// Bottom-right cell, e.g. `D10`. Empty means the same as `start`.
    pub end: String,
}

impl RangeInput {
    pub fn new<S: Into<String>, E: Into<String>>(start: S, end: E) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Read whole sheets
    pub fn full() -> Self {
        Self::default()
    }

    pub fn parse(&self) -> Result<ReadSpec, RangeFormatError> {
        ReadSpec::parse(&self.start, &self.end)
    }
}

/// Read window applied to every sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSpec {
    /// 0-based column positions to keep (`None` keeps all)
    pub usecols: Option<Range<u16>>,
    /// Leading sheet rows to skip
    pub skiprows: u32,
    /// Rows to read after the skipped ones, not counting a header row
    /// (`None` reads to the end)
    pub nrows: Option<u32>,
}

impl ReadSpec {
    /// The window that reads everything
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.usecols.is_none() && self.skiprows == 0 && self.nrows.is_none()
    }

    /// Parse start/end anchors.
    ///
    /// Letters and digits are each gathered from the whole anchor, so `a1`,
    /// `$A$1` and ` A 1 ` all mean the first cell. An empty `start` reads
    /// everything; an empty `end` repeats `start`.
    ///
    /// ```
    /// use sheetmerge::ReadSpec;
    ///
    /// let spec = ReadSpec::parse("B2", "C4").unwrap();
    /// assert_eq!(spec.usecols, Some(1..3));
    /// assert_eq!(spec.skiprows, 1);
    /// assert_eq!(spec.nrows, Some(3));
    /// ```
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeFormatError> {
        let start = start.trim();
        if start.is_empty() {
            return Ok(Self::full());
        }
        let end = match end.trim() {
            "" => start,
            end => end,
        };

        let (start_col, start_row) = parse_anchor(start)?;
        let (end_col, end_row) = parse_anchor(end)?;

        if end_row < start_row || end_col < start_col {
            return Err(RangeFormatError::Reversed {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(Self {
            usecols: Some(start_col..end_col + 1),
            skiprows: start_row,
            nrows: Some(end_row - start_row + 1),
        })
    }
}

/// Split an anchor into a 0-based column and a 0-based row
fn parse_anchor(cell: &str) -> Result<(u16, u32), RangeFormatError> {
    let letters: String = cell.chars().filter(char::is_ascii_alphabetic).collect();
    let digits: String = cell.chars().filter(char::is_ascii_digit).collect();

    if letters.is_empty() {
        return Err(RangeFormatError::MissingColumn(cell.to_string()));
    }
    if digits.is_empty() {
        return Err(RangeFormatError::MissingRow(cell.to_string()));
    }

    let col = CellAddress::letters_to_column(&letters)
        .map_err(|_| RangeFormatError::InvalidColumn(cell.to_string()))?;
    let row = CellAddress::parse_row_number(&digits)
        .map_err(|_| RangeFormatError::InvalidRow(cell.to_string()))?;

    Ok((col, row))
}
