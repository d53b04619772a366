//! BIFF8 number format records.
//!
//! FORMAT and XF records from the workbook globals stream are reduced to a
//! single answer per XF index: does this cell format display a date?

use std::collections::HashMap;

use sheetmerge_core::NumberFormat;

use crate::biff::parser::read_u16;
use crate::biff::strings::read_unicode_string;
use crate::error::{XlsError, XlsResult};

/// Number formats collected from the globals stream
#[derive(Debug, Default)]
pub(crate) struct FormatTable {
    /// Custom format strings keyed by format index
    custom: HashMap<u16, String>,
    /// Format index of each XF record, in XF order
    xf_formats: Vec<u16>,
}

impl FormatTable {
    pub(crate) fn add_format(&mut self, data: &[u8]) {
        match parse_format(data) {
            Ok((id, code)) => {
                self.custom.insert(id, code);
            }
            Err(e) => log::debug!("skipping malformed FORMAT record: {e}"),
        }
    }

    pub(crate) fn add_xf(&mut self, data: &[u8]) {
        match parse_xf_format(data) {
            Ok(id) => self.xf_formats.push(id),
            Err(e) => {
                // Keep XF indices aligned with the file
                log::debug!("malformed XF record: {e}");
                self.xf_formats.push(0);
            }
        }
    }

    /// Whether cells using XF `xf_index` display dates or times
    pub(crate) fn is_date(&self, xf_index: u16) -> bool {
        self.xf_formats
            .get(xf_index as usize)
            .map_or(false, |&id| {
                NumberFormat::resolve(id as u32, self.custom.get(&id).map(String::as_str))
                    .is_date_format()
            })
    }
}

/// Parse a FORMAT record (0x041E).
///
/// Layout:
///   0  u16  ifmt   (format index)
///   2  ...  format string (unicode string, 2-byte length prefix)
pub(crate) fn parse_format(data: &[u8]) -> XlsResult<(u16, String)> {
    let mut off = 0;
    let ifmt = read_u16(data, &mut off)?;
    let s = read_unicode_string(data, &mut off)?;
    Ok((ifmt, s))
}

/// Read the format index of an XF record (0x00E0, always 20 bytes in BIFF8).
///
/// Layout (see [MS-XLS] §2.4.353):
///   0   u16  ifnt   (font index)
///   2   u16  ifmt   (format index)
///   4   ...  protection, alignment, borders and fill (ignored)
pub(crate) fn parse_xf_format(data: &[u8]) -> XlsResult<u16> {
    if data.len() < 20 {
        return Err(XlsError::Parse(format!(
            "XF record too short: {} bytes (expected 20)",
            data.len()
        )));
    }
    let mut off = 2;
    read_u16(data, &mut off)
}
