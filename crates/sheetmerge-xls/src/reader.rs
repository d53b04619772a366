//! XLS (BIFF8) reader.
//!
//! Opens a Compound File Binary (CFB/OLE2) container, reads the `Workbook`
//! stream, parses BIFF8 records, and populates a `sheetmerge_core::Worksheet`
//! per worksheet substream.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use sheetmerge_core::{CellError, CellValue, Workbook, Worksheet};

use crate::biff::parser::{read_8_bytes, read_f64, read_rk, read_u16, read_u32, read_u8};
use crate::biff::records;
use crate::biff::strings::{parse_sst, read_short_string, read_unicode_string};
use crate::biff::{self, BiffRecord};
use crate::error::{XlsError, XlsResult};
use crate::styles::FormatTable;

/// Days between the 1900 and 1904 date system epochs
const DATE_1904_OFFSET: f64 = 1462.0;

/// XLS file reader.
pub struct XlsReader;

/// Metadata for a sheet parsed from the BOUNDSHEET record.
#[derive(Debug)]
struct SheetInfo {
    /// Absolute byte offset of the sheet's BOF in the Workbook stream.
    offset: u32,
    /// Sheet type: 0 = worksheet, 2 = chart, 6 = macro/VBA.
    sheet_type: u8,
    /// Sheet name.
    name: String,
}

impl SheetInfo {
    fn is_worksheet(&self) -> bool {
        self.sheet_type == records::SHEET_TYPE_WORKSHEET
    }
}

/// Everything decoded from the workbook globals substream.
#[derive(Default)]
struct Globals {
    sst: Vec<String>,
    sheets: Vec<SheetInfo>,
    date_1904: bool,
    formats: FormatTable,
}

/// One BOF..EOF substream after the globals.
struct Substream<'a> {
    bof_offset: u64,
    records: Vec<&'a BiffRecord>,
}

/// A parsed Workbook stream: globals plus the remaining records.
struct BiffWorkbook {
    globals: Globals,
    records: Vec<BiffRecord>,
    globals_end: usize,
}

impl BiffWorkbook {
    fn open<R: Read + Seek>(reader: R) -> XlsResult<Self> {
        let mut cfb = cfb::CompoundFile::open(reader)?;

        // Some files use "Book" for the stream name
        let stream_path = if cfb.exists("/Workbook") {
            "/Workbook"
        } else if cfb.exists("/Book") {
            "/Book"
        } else {
            return Err(XlsError::InvalidFormat(
                "no Workbook or Book stream found in CFB".into(),
            ));
        };

        let mut stream_data = Vec::new();
        {
            let mut stream = cfb.open_stream(stream_path)?;
            stream.read_to_end(&mut stream_data)?;
        }

        let records = biff::read_all_records(&mut Cursor::new(&stream_data))?;
        let (globals, globals_end) = Self::parse_globals(&records)?;

        Ok(Self {
            globals,
            records,
            globals_end,
        })
    }

    /// Phase 1: walk the globals substream up to its EOF.
    fn parse_globals(all_records: &[BiffRecord]) -> XlsResult<(Globals, usize)> {
        let mut globals = Globals::default();
        let mut in_globals = false;

        for (idx, rec) in all_records.iter().enumerate() {
            match rec.record_type {
                records::BOF if !in_globals => {
                    let (version, dt) = biff::parse_bof(&rec.data)?;
                    if dt != records::BOF_WORKBOOK_GLOBALS {
                        return Err(XlsError::InvalidFormat(format!(
                            "stream does not start with workbook globals (BOF type 0x{dt:04X})"
                        )));
                    }
                    if version != records::BIFF8_VERSION {
                        return Err(XlsError::UnsupportedVersion(format!(
                            "expected BIFF8 (0x0600), got 0x{version:04X}"
                        )));
                    }
                    in_globals = true;
                }
                records::EOF if in_globals => return Ok((globals, idx)),
                _ if !in_globals => {}
                records::SST => {
                    globals.sst = parse_sst(&rec.data, &rec.continue_offsets)?;
                }
                records::BOUNDSHEET => {
                    globals.sheets.push(parse_boundsheet(&rec.data)?);
                }
                records::DATEMODE => {
                    if rec.data.len() >= 2 {
                        globals.date_1904 = u16::from_le_bytes([rec.data[0], rec.data[1]]) == 1;
                    }
                }
                records::FORMAT => globals.formats.add_format(&rec.data),
                records::XF => globals.formats.add_xf(&rec.data),
                _ => {}
            }
        }

        Err(XlsError::InvalidFormat(if in_globals {
            "workbook globals are not terminated".into()
        } else {
            "no workbook globals BOF found".into()
        }))
    }

    /// Split the records after the globals into BOF..EOF substreams.
    fn substreams(&self) -> Vec<Substream<'_>> {
        let mut groups = Vec::new();
        let mut current: Option<Substream<'_>> = None;
        let mut depth = 0usize;

        for rec in &self.records[self.globals_end + 1..] {
            match rec.record_type {
                records::BOF => {
                    if depth == 0 {
                        current = Some(Substream {
                            bof_offset: rec.stream_offset,
                            records: Vec::new(),
                        });
                    }
                    depth += 1;
                }
                records::EOF => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                    }
                }
                _ => {
                    if let Some(group) = current.as_mut() {
                        group.records.push(rec);
                    }
                }
            }
        }

        groups
    }

    fn worksheet_names(&self) -> Vec<String> {
        self.globals
            .sheets
            .iter()
            .filter(|info| info.is_worksheet())
            .map(|info| info.name.clone())
            .collect()
    }

    /// Decode the worksheet at `biff_idx` in BOUNDSHEET order.
    fn read_worksheet(&self, biff_idx: usize, substreams: &[Substream<'_>]) -> XlsResult<Worksheet> {
        let info = &self.globals.sheets[biff_idx];
        let mut ws = Worksheet::new(info.name.clone());

        // BOUNDSHEET offsets are authoritative; fall back to substream order
        let substream = substreams
            .iter()
            .find(|s| s.bof_offset == info.offset as u64)
            .or_else(|| {
                log::debug!(
                    "no substream at offset {} for sheet '{}', using position {}",
                    info.offset,
                    info.name,
                    biff_idx
                );
                substreams.get(biff_idx)
            });

        if let Some(substream) = substream {
            let ctx = CellContext {
                sst: &self.globals.sst,
                formats: &self.globals.formats,
                date_1904: self.globals.date_1904,
            };
            parse_sheet_records(&substream.records, &mut ws, &ctx)?;
        }

        Ok(ws)
    }
}

impl XlsReader {
    /// Read an XLS file from a filesystem path.
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file)
    }

    /// Read every worksheet from any `Read + Seek` source.
    ///
    /// Chart and macro sheets are skipped.
    pub fn read<R: Read + Seek>(reader: R) -> XlsResult<Workbook> {
        let book = BiffWorkbook::open(reader)?;
        let substreams = book.substreams();

        let mut workbook = Workbook::empty();
        for (biff_idx, info) in book.globals.sheets.iter().enumerate() {
            if !info.is_worksheet() {
                continue;
            }
            let ws = book.read_worksheet(biff_idx, &substreams)?;
            workbook.add_existing_worksheet(ws)?;
        }

        Ok(workbook)
    }

    /// List worksheet names in workbook order.
    pub fn sheet_names<R: Read + Seek>(reader: R) -> XlsResult<Vec<String>> {
        Ok(BiffWorkbook::open(reader)?.worksheet_names())
    }

    /// Decode only the worksheet called `name`.
    pub fn read_sheet<R: Read + Seek>(reader: R, name: &str) -> XlsResult<Worksheet> {
        let book = BiffWorkbook::open(reader)?;
        let biff_idx = book
            .globals
            .sheets
            .iter()
            .position(|info| info.is_worksheet() && info.name == name)
            .ok_or_else(|| XlsError::SheetNotFound(name.to_string()))?;

        let substreams = book.substreams();
        book.read_worksheet(biff_idx, &substreams)
    }
}

/// Parse a BOUNDSHEET record body.
fn parse_boundsheet(data: &[u8]) -> XlsResult<SheetInfo> {
    let mut offset = 0;
    let abs_offset = read_u32(data, &mut offset)?;
    let _visibility = read_u8(data, &mut offset)?;
    let sheet_type = read_u8(data, &mut offset)?;
    let name = read_short_string(data, &mut offset)?;

    Ok(SheetInfo {
        offset: abs_offset,
        sheet_type,
        name,
    })
}

/// Globals needed to turn cell records into values.
struct CellContext<'a> {
    sst: &'a [String],
    formats: &'a FormatTable,
    date_1904: bool,
}

impl CellContext<'_> {
    fn number(&self, xf_idx: u16, value: f64) -> CellValue {
        if self.formats.is_date(xf_idx) {
            let serial = if self.date_1904 {
                value + DATE_1904_OFFSET
            } else {
                value
            };
            CellValue::DateTime(serial)
        } else {
            CellValue::Number(value)
        }
    }
}

/// Row, column and XF index that open every cell record.
fn read_cell_header(data: &[u8], off: &mut usize) -> XlsResult<(u32, u16, u16)> {
    let row = read_u16(data, off)? as u32;
    let col = read_u16(data, off)?;
    let xf_idx = read_u16(data, off)?;
    Ok((row, col, xf_idx))
}

/// Parse cell records from a sheet's record group.
fn parse_sheet_records(
    records: &[&BiffRecord],
    ws: &mut Worksheet,
    ctx: &CellContext<'_>,
) -> XlsResult<()> {
    // A STRING record carries the cached text of the FORMULA right before it
    let mut pending_formula_cell: Option<(u32, u16)> = None;

    for rec in records {
        let data = rec.data.as_slice();
        match rec.record_type {
            records::LABELSST => {
                // row(2) + col(2) + xf(2) + sst_index(4)
                let mut off = 0;
                let (row, col, _) = read_cell_header(data, &mut off)?;
                let sst_idx = read_u32(data, &mut off)? as usize;
                match ctx.sst.get(sst_idx) {
                    Some(s) => ws.set_cell_value_at(row, col, s.as_str())?,
                    None => log::warn!("SST index {sst_idx} out of range in '{}'", ws.name()),
                }
                pending_formula_cell = None;
            }
            records::LABEL => {
                // row(2) + col(2) + xf(2) + unicode_string
                let mut off = 0;
                let (row, col, _) = read_cell_header(data, &mut off)?;
                let text = read_unicode_string(data, &mut off)?;
                ws.set_cell_value_at(row, col, text)?;
                pending_formula_cell = None;
            }
            records::NUMBER => {
                // row(2) + col(2) + xf(2) + f64(8)
                let mut off = 0;
                let (row, col, xf_idx) = read_cell_header(data, &mut off)?;
                let value = read_f64(data, &mut off)?;
                ws.set_cell_value_at(row, col, ctx.number(xf_idx, value))?;
                pending_formula_cell = None;
            }
            records::RK => {
                // row(2) + col(2) + xf(2) + rk(4)
                let mut off = 0;
                let (row, col, xf_idx) = read_cell_header(data, &mut off)?;
                let value = read_rk(data, &mut off)?;
                ws.set_cell_value_at(row, col, ctx.number(xf_idx, value))?;
                pending_formula_cell = None;
            }
            records::MULRK => {
                parse_mulrk(data, ws, ctx)?;
                pending_formula_cell = None;
            }
            records::BOOLERR => {
                // row(2) + col(2) + xf(2) + value(1) + is_error(1)
                let mut off = 0;
                let (row, col, _) = read_cell_header(data, &mut off)?;
                let val = data.get(off).copied().unwrap_or(0);
                let is_error = data.get(off + 1).copied().unwrap_or(0);
                let value = if is_error != 0 {
                    CellValue::Error(CellError::from_code(val))
                } else {
                    CellValue::Boolean(val != 0)
                };
                ws.set_cell_value_at(row, col, value)?;
                pending_formula_cell = None;
            }
            records::FORMULA => {
                pending_formula_cell = parse_formula(data, ws, ctx)?;
            }
            records::STRING => {
                if let Some((row, col)) = pending_formula_cell.take() {
                    let mut off = 0;
                    let text = read_unicode_string(data, &mut off)?;
                    ws.set_cell_value_at(row, col, text)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// MULRK: row(2) + first_col(2) + [xf(2) + rk(4)]* + last_col(2)
fn parse_mulrk(data: &[u8], ws: &mut Worksheet, ctx: &CellContext<'_>) -> XlsResult<()> {
    if data.len() < 6 {
        return Err(XlsError::Parse("MULRK record too short".into()));
    }
    let mut off = 0;
    let row = read_u16(data, &mut off)? as u32;
    let first_col = read_u16(data, &mut off)?;

    let last_col = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);
    let rk_data_end = data.len() - 2;

    let mut col = first_col;
    while off + 6 <= rk_data_end && col <= last_col {
        let xf_idx = read_u16(data, &mut off)?;
        let value = read_rk(data, &mut off)?;
        ws.set_cell_value_at(row, col, ctx.number(xf_idx, value))?;
        col += 1;
    }

    Ok(())
}

/// FORMULA: row(2) + col(2) + xf(2) + result(8) + options(2) + reserved(4) + formula_data(...)
///
/// Only the cached result is kept. Returns the cell position when the
/// result is a string, which arrives in a following STRING record.
fn parse_formula(
    data: &[u8],
    ws: &mut Worksheet,
    ctx: &CellContext<'_>,
) -> XlsResult<Option<(u32, u16)>> {
    if data.len() < 20 {
        return Err(XlsError::Parse("FORMULA record too short".into()));
    }

    let mut off = 0;
    let (row, col, xf_idx) = read_cell_header(data, &mut off)?;
    let result = read_8_bytes(data, &mut off)?;

    // Bytes 6-7 == 0xFFFF mark a non-numeric result
    if result[6] != 0xFF || result[7] != 0xFF {
        ws.set_cell_value_at(row, col, ctx.number(xf_idx, f64::from_le_bytes(result)))?;
        return Ok(None);
    }

    match result[0] {
        0x00 => return Ok(Some((row, col))),
        0x01 => ws.set_cell_value_at(row, col, CellValue::Boolean(result[2] != 0))?,
        0x02 => ws.set_cell_value_at(row, col, CellError::from_code(result[2]))?,
        // 0x03 is an empty string result
        _ => {}
    }

    Ok(None)
}
