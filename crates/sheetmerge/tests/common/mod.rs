//! Workbook fixtures built in memory.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use sheetmerge::{CellValue, SourceFile, Workbook, Worksheet, XlsxWriter};

/// One worksheet given as rows of cell values
pub type Rows = Vec<Vec<CellValue>>;

/// Text cells; an empty string leaves the cell blank
pub fn text_rows(rows: &[&[&str]]) -> Rows {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|&text| {
                    if text.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::string(text)
                    }
                })
                .collect()
        })
        .collect()
}

fn worksheet(name: &str, rows: &Rows) -> Worksheet {
    let mut ws = Worksheet::new(name);
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            ws.set_cell_value_at(r as u32, c as u16, value.clone()).unwrap();
        }
    }
    ws
}

/// XLSX bytes holding `sheets` in order
pub fn xlsx_bytes(sheets: &[(&str, Rows)]) -> Vec<u8> {
    let mut workbook = Workbook::empty();
    for (name, rows) in sheets {
        workbook.add_existing_worksheet(worksheet(name, rows)).unwrap();
    }
    let mut buffer = Cursor::new(Vec::new());
    XlsxWriter::write(&workbook, &mut buffer).unwrap();
    buffer.into_inner()
}

pub fn xlsx_file(name: &str, sheets: &[(&str, Rows)]) -> SourceFile {
    SourceFile::new(name, xlsx_bytes(sheets)).unwrap()
}

fn record(out: &mut Vec<u8>, record_type: u16, body: &[u8]) {
    out.extend_from_slice(&record_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

fn utf16_chars(text: &str) -> Vec<u8> {
    let mut out = vec![0x01];
    out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
    out
}

/// XLS (BIFF8) bytes holding text and number cells only
pub fn xls_bytes(sheets: &[(&str, Rows)]) -> Vec<u8> {
    const BOF: u16 = 0x0809;
    const EOF: u16 = 0x000A;
    const BOUNDSHEET: u16 = 0x0085;
    const LABEL: u16 = 0x0204;
    const NUMBER: u16 = 0x0203;

    let boundsheet = |offset: u32, name: &str| {
        let mut body = offset.to_le_bytes().to_vec();
        body.extend_from_slice(&[0x00, 0x00, name.encode_utf16().count() as u8]);
        body.extend(utf16_chars(name));
        body
    };

    let globals = |offsets: &[u32]| {
        let mut out = Vec::new();
        record(&mut out, BOF, &[0x00, 0x06, 0x05, 0x00, 0, 0, 0, 0]);
        for ((name, _), &offset) in sheets.iter().zip(offsets) {
            record(&mut out, BOUNDSHEET, &boundsheet(offset, name));
        }
        record(&mut out, EOF, &[]);
        out
    };

    let mut substreams = Vec::new();
    let mut offsets = Vec::new();
    let globals_len = globals(&vec![0; sheets.len()]).len() as u32;
    for (_, rows) in sheets {
        offsets.push(globals_len + substreams.len() as u32);
        record(&mut substreams, BOF, &[0x00, 0x06, 0x10, 0x00, 0, 0, 0, 0]);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let mut body = (r as u16).to_le_bytes().to_vec();
                body.extend_from_slice(&(c as u16).to_le_bytes());
                body.extend_from_slice(&0u16.to_le_bytes());
                match value {
                    CellValue::String(text) => {
                        body.extend_from_slice(&(text.encode_utf16().count() as u16).to_le_bytes());
                        body.extend(utf16_chars(text));
                        record(&mut substreams, LABEL, &body);
                    }
                    CellValue::Number(n) => {
                        body.extend_from_slice(&n.to_le_bytes());
                        record(&mut substreams, NUMBER, &body);
                    }
                    CellValue::Empty => {}
                    other => panic!("unsupported fixture value {:?}", other),
                }
            }
        }
        record(&mut substreams, EOF, &[]);
    }

    let mut stream = globals(&offsets);
    stream.extend(substreams);

    let mut ole = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    {
        let mut workbook = ole.create_stream("/Workbook").unwrap();
        workbook.write_all(&stream).unwrap();
    }
    ole.flush().unwrap();
    ole.into_inner().into_inner()
}

pub fn xls_file(name: &str, sheets: &[(&str, Rows)]) -> SourceFile {
    SourceFile::new(name, xls_bytes(sheets)).unwrap()
}

/// Cell texts of a table, blanks as empty strings
pub fn table_text(table: &sheetmerge::Table) -> Vec<Vec<String>> {
    table
        .rows()
        .iter()
        .map(|row| row.iter().map(|c| c.clone().unwrap_or_default()).collect())
        .collect()
}

pub fn labels(table: &sheetmerge::Table) -> Vec<String> {
    table.columns().iter().map(ToString::to_string).collect()
}
