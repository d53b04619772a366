//! BIFF8 Unicode string decoding.
//!
//! BIFF8 strings have a complex encoding:
//! - Header: char_count (2 bytes) + flags (1 byte)
//! - Flags bit 0 (`fHighByte`): 0 = compressed Latin-1, 1 = uncompressed UTF-16LE
//! - Flags bit 2 (`fExtSt`): extended string data follows (Asian phonetic)
//! - Flags bit 3 (`fRichSt`): rich text run array follows
//! - If fRichSt: 2-byte run count follows the flags
//! - If fExtSt: 4-byte extended data size follows
//! - Then the character data
//! - Then the rich text runs (4 bytes each) if fRichSt
//! - Then the extended data if fExtSt
//!
//! In SST records, the character data of one string can span a CONTINUE
//! boundary. The continuation then starts with a fresh flags byte, and the
//! encoding may switch between compressed and UTF-16 at that point.

use super::parser::{read_u16, read_u32, read_u8};
use crate::error::{XlsError, XlsResult};

const FLAG_HIGH_BYTE: u8 = 0x01;
const FLAG_EXT: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

/// Read a BIFF8 "short" string (1-byte length prefix, used in BOUNDSHEET etc.).
pub fn read_short_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let char_count = read_u8(data, offset)? as usize;
    let flags = read_u8(data, offset)?;
    read_characters(data, offset, char_count, flags, &[])
}

/// Read a BIFF8 Unicode string with a 2-byte length prefix (LABEL, FORMAT, STRING).
pub fn read_unicode_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    read_string_with_boundaries(data, offset, &[])
}

fn read_string_with_boundaries(
    data: &[u8],
    offset: &mut usize,
    boundaries: &[usize],
) -> XlsResult<String> {
    let char_count = read_u16(data, offset)? as usize;
    let flags = read_u8(data, offset)?;

    let run_count = if flags & FLAG_RICH != 0 {
        read_u16(data, offset)?
    } else {
        0
    };
    let ext_size = if flags & FLAG_EXT != 0 {
        read_u32(data, offset)?
    } else {
        0
    };

    let text = read_characters(data, offset, char_count, flags, boundaries)?;

    // Rich text runs are 4 bytes each (char_pos u16 + font_idx u16)
    *offset += run_count as usize * 4 + ext_size as usize;

    Ok(text)
}

/// Read `char_count` characters, re-reading the flags byte at every
/// continuation boundary crossed.
fn read_characters(
    data: &[u8],
    offset: &mut usize,
    char_count: usize,
    flags: u8,
    boundaries: &[usize],
) -> XlsResult<String> {
    let mut units: Vec<u16> = Vec::with_capacity(char_count);
    let mut wide = flags & FLAG_HIGH_BYTE != 0;
    let mut remaining = char_count;

    while remaining > 0 {
        if boundaries.binary_search(offset).is_ok() {
            wide = read_u8(data, offset)? & FLAG_HIGH_BYTE != 0;
        }

        let limit = boundaries
            .iter()
            .copied()
            .find(|&b| b > *offset)
            .unwrap_or(data.len())
            .min(data.len());
        let width = if wide { 2 } else { 1 };
        let take = remaining.min(limit.saturating_sub(*offset) / width);
        if take == 0 {
            return Err(XlsError::Parse(format!(
                "string data too short: {} character(s) missing at offset {}",
                remaining, *offset
            )));
        }

        let bytes = &data[*offset..*offset + take * width];
        if wide {
            units.extend(
                bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
            );
        } else {
            // Compressed strings hold the low byte of each UTF-16 unit
            units.extend(bytes.iter().map(|&b| b as u16));
        }
        *offset += take * width;
        remaining -= take;
    }

    String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16 string: {e}")))
}

/// Parse the entire SST (Shared String Table) from a concatenated buffer
/// (SST body + all CONTINUE bodies already joined).
///
/// `boundaries` are the offsets where each CONTINUE body begins.
///
/// The SST body starts with:
/// - `total_strings` (4 bytes, u32): total string refs in workbook
/// - `unique_strings` (4 bytes, u32): number of unique strings in this table
/// - Then `unique_strings` Unicode string entries
pub fn parse_sst(data: &[u8], boundaries: &[usize]) -> XlsResult<Vec<String>> {
    let mut offset = 0;

    let _total_strings = read_u32(data, &mut offset)?;
    let unique_count = read_u32(data, &mut offset)? as usize;

    // The declared count is untrusted; cap the preallocation
    let mut strings = Vec::with_capacity(unique_count.min(data.len() / 3));

    for i in 0..unique_count {
        match read_string_with_boundaries(data, &mut offset, boundaries) {
            Ok(s) => strings.push(s),
            Err(e) => {
                // Some files pad or truncate the SST; keep what was decoded
                log::warn!("SST parse error at string {i}/{unique_count}: {e}");
                break;
            }
        }
    }

    Ok(strings)
}
