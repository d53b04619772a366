//! In-memory BIFF8 workbook builder for tests.
//!
//! Produces a CFB container with a `Workbook` stream that holds a globals
//! substream (formats, XFs, sheet directory, SST) followed by one substream
//! per sheet, with BOUNDSHEET offsets pointing at the right BOF records.

#![allow(dead_code)]

use std::io::{Cursor, Write};

const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const BOUNDSHEET: u16 = 0x0085;
const SST: u16 = 0x00FC;
const DATEMODE: u16 = 0x0022;
const FORMAT: u16 = 0x041E;
const XF: u16 = 0x00E0;
const LABELSST: u16 = 0x00FD;
const LABEL: u16 = 0x0204;
const NUMBER: u16 = 0x0203;
const RK: u16 = 0x027E;
const MULRK: u16 = 0x00BD;
const BOOLERR: u16 = 0x0205;
const FORMULA: u16 = 0x0006;
const STRING: u16 = 0x0207;

/// XF index of a plain number format in every built workbook
pub const XF_GENERAL: u16 = 0;
/// XF index of built-in format 14 (m/d/yyyy)
pub const XF_DATE: u16 = 1;
/// XF index of the custom `yyyy"年"m"月"d"日"` format
pub const XF_CUSTOM_DATE: u16 = 2;

fn record(out: &mut Vec<u8>, record_type: u16, body: &[u8]) {
    out.extend_from_slice(&record_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

/// Encode a BIFF8 string body (flags byte + characters) without a length prefix
fn string_chars(s: &str) -> (u8, Vec<u8>) {
    if s.chars().all(|c| (c as u32) < 0x100) {
        (0x00, s.chars().map(|c| c as u8).collect())
    } else {
        let bytes = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
        (0x01, bytes)
    }
}

fn unicode_string(s: &str) -> Vec<u8> {
    let (flags, chars) = string_chars(s);
    let mut out = (s.encode_utf16().count() as u16).to_le_bytes().to_vec();
    out.push(flags);
    out.extend(chars);
    out
}

fn short_string(s: &str) -> Vec<u8> {
    let (flags, chars) = string_chars(s);
    let mut out = vec![s.encode_utf16().count() as u8, flags];
    out.extend(chars);
    out
}

fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&col.to_le_bytes());
    out.extend_from_slice(&xf.to_le_bytes());
    out
}

fn rk_integer(value: i32) -> u32 {
    ((value << 2) as u32) | 0x02
}

/// A sheet substream under construction
pub struct SheetBuilder {
    name: String,
    sheet_type: u8,
    records: Vec<u8>,
}

impl SheetBuilder {
    pub fn label(&mut self, row: u16, col: u16, text: &str) -> &mut Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend(unicode_string(text));
        record(&mut self.records, LABEL, &body);
        self
    }

    pub fn number(&mut self, row: u16, col: u16, xf: u16, value: f64) -> &mut Self {
        let mut body = cell_header(row, col, xf);
        body.extend_from_slice(&value.to_le_bytes());
        record(&mut self.records, NUMBER, &body);
        self
    }

    pub fn rk(&mut self, row: u16, col: u16, value: i32) -> &mut Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&rk_integer(value).to_le_bytes());
        record(&mut self.records, RK, &body);
        self
    }

    pub fn mulrk(&mut self, row: u16, first_col: u16, values: &[i32]) -> &mut Self {
        let mut body = row.to_le_bytes().to_vec();
        body.extend_from_slice(&first_col.to_le_bytes());
        for &value in values {
            body.extend_from_slice(&XF_GENERAL.to_le_bytes());
            body.extend_from_slice(&rk_integer(value).to_le_bytes());
        }
        let last_col = first_col + values.len() as u16 - 1;
        body.extend_from_slice(&last_col.to_le_bytes());
        record(&mut self.records, MULRK, &body);
        self
    }

    pub fn boolean(&mut self, row: u16, col: u16, value: bool) -> &mut Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&[value as u8, 0]);
        record(&mut self.records, BOOLERR, &body);
        self
    }

    pub fn error(&mut self, row: u16, col: u16, code: u8) -> &mut Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&[code, 1]);
        record(&mut self.records, BOOLERR, &body);
        self
    }

    fn formula(&mut self, row: u16, col: u16, xf: u16, result: [u8; 8]) {
        let mut body = cell_header(row, col, xf);
        body.extend_from_slice(&result);
        body.extend_from_slice(&0u16.to_le_bytes()); // options
        body.extend_from_slice(&0u32.to_le_bytes()); // reserved
        body.extend_from_slice(&[0x00, 0x00]); // empty formula expression
        record(&mut self.records, FORMULA, &body);
    }

    pub fn formula_number(&mut self, row: u16, col: u16, value: f64) -> &mut Self {
        self.formula(row, col, XF_GENERAL, value.to_le_bytes());
        self
    }

    pub fn formula_string(&mut self, row: u16, col: u16, text: &str) -> &mut Self {
        self.formula(row, col, XF_GENERAL, [0x00, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        record(&mut self.records, STRING, &unicode_string(text));
        self
    }

    pub fn formula_bool(&mut self, row: u16, col: u16, value: bool) -> &mut Self {
        self.formula(
            row,
            col,
            XF_GENERAL,
            [0x01, 0, value as u8, 0, 0, 0, 0xFF, 0xFF],
        );
        self
    }
}

/// A workbook under construction
#[derive(Default)]
pub struct XlsBuilder {
    date_1904: bool,
    sst: Vec<String>,
    sheets: Vec<SheetBuilder>,
}

impl XlsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_1904(mut self) -> Self {
        self.date_1904 = true;
        self
    }

    pub fn sheet(&mut self, name: &str) -> &mut SheetBuilder {
        self.push_sheet(name, 0x00)
    }

    /// A chart sheet: listed in the directory but not a worksheet
    pub fn chart(&mut self, name: &str) -> &mut SheetBuilder {
        self.push_sheet(name, 0x02)
    }

    fn push_sheet(&mut self, name: &str, sheet_type: u8) -> &mut SheetBuilder {
        self.sheets.push(SheetBuilder {
            name: name.to_string(),
            sheet_type,
            records: Vec::new(),
        });
        let index = self.sheets.len() - 1;
        &mut self.sheets[index]
    }

    /// Add a LABELSST cell to the sheet at `sheet`, interning the text
    pub fn shared_string(&mut self, sheet: usize, row: u16, col: u16, text: &str) -> &mut Self {
        let index = match self.sst.iter().position(|s| s == text) {
            Some(i) => i,
            None => {
                self.sst.push(text.to_string());
                self.sst.len() - 1
            }
        };
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&(index as u32).to_le_bytes());
        record(&mut self.sheets[sheet].records, LABELSST, &body);
        self
    }

    fn globals(&self, offsets: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        record(&mut out, BOF, &[0x00, 0x06, 0x05, 0x00, 0, 0, 0, 0]);
        record(&mut out, DATEMODE, &(self.date_1904 as u16).to_le_bytes());

        let mut format = 164u16.to_le_bytes().to_vec();
        format.extend(unicode_string("yyyy\"年\"m\"月\"d\"日\""));
        record(&mut out, FORMAT, &format);

        for format_index in [0u16, 14, 164] {
            let mut xf = vec![0u8; 20];
            xf[2..4].copy_from_slice(&format_index.to_le_bytes());
            record(&mut out, XF, &xf);
        }

        for (sheet, offset) in self.sheets.iter().zip(offsets) {
            let mut body = offset.to_le_bytes().to_vec();
            body.extend_from_slice(&[0x00, sheet.sheet_type]);
            body.extend(short_string(&sheet.name));
            record(&mut out, BOUNDSHEET, &body);
        }

        let mut sst = (self.sst.len() as u32).to_le_bytes().to_vec();
        sst.extend_from_slice(&(self.sst.len() as u32).to_le_bytes());
        for s in &self.sst {
            sst.extend(unicode_string(s));
        }
        record(&mut out, SST, &sst);

        record(&mut out, EOF, &[]);
        out
    }

    /// Serialize the BIFF8 `Workbook` stream
    pub fn stream(&self) -> Vec<u8> {
        // BOUNDSHEET sizes do not depend on the offsets they carry
        let globals_len = self.globals(&vec![0; self.sheets.len()]).len() as u32;

        let mut offsets = Vec::with_capacity(self.sheets.len());
        let mut substreams = Vec::new();
        for sheet in &self.sheets {
            offsets.push(globals_len + substreams.len() as u32);
            let dt: u16 = if sheet.sheet_type == 0x02 { 0x0020 } else { 0x0010 };
            let mut bof = vec![0x00, 0x06];
            bof.extend_from_slice(&dt.to_le_bytes());
            bof.extend_from_slice(&[0, 0, 0, 0]);
            record(&mut substreams, BOF, &bof);
            substreams.extend_from_slice(&sheet.records);
            record(&mut substreams, EOF, &[]);
        }

        let mut stream = self.globals(&offsets);
        stream.extend(substreams);
        stream
    }

    /// Wrap the stream in a compound file
    pub fn build(&self) -> Vec<u8> {
        let cursor = Cursor::new(Vec::new());
        let mut ole = cfb::CompoundFile::create(cursor).expect("create cfb");
        {
            let mut stream = ole.create_stream("/Workbook").expect("create stream");
            stream.write_all(&self.stream()).expect("write stream");
        }
        ole.flush().expect("flush cfb");
        ole.into_inner().into_inner()
    }
}
