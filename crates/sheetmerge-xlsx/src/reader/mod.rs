//! XLSX reader

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use sheetmerge_core::{CellAddress, CellError, CellValue, Workbook, Worksheet, MAX_COLS};

use crate::error::{XlsxError, XlsxResult};
use crate::styles::{read_styles_xml, CellFormats};

/// Days between the 1900 and 1904 date system epochs
const DATE_1904_OFFSET: f64 = 1462.0;

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode characters XML cannot carry:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    result.push_str(rest);

    result
}

/// A worksheet entry from `xl/workbook.xml`, resolved to its part path
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    path: String,
}

/// An opened XLSX package with its workbook-level metadata loaded
struct Package<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    sheets: Vec<SheetEntry>,
    date_1904: bool,
}

impl<R: Read + Seek> Package<R> {
    fn open(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;

        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let (sheet_info, date_1904) = XlsxReader::read_workbook_xml(&mut archive)?;
        let sheet_paths = XlsxReader::read_workbook_rels(&mut archive)?;

        let mut sheets = Vec::with_capacity(sheet_info.len());
        for (name, r_id) in sheet_info {
            match sheet_paths.get(&r_id) {
                Some(path) => sheets.push(SheetEntry {
                    name,
                    path: path.clone(),
                }),
                // Chart sheets and dialog sheets have non-worksheet relationships
                None => log::debug!("skipping sheet '{}' without a worksheet part", name),
            }
        }

        Ok(Self {
            archive,
            sheets,
            date_1904,
        })
    }

    fn read_sheet(&mut self, entry: &SheetEntry) -> XlsxResult<Worksheet> {
        let shared_strings = XlsxReader::read_shared_strings(&mut self.archive)?;
        let formats = XlsxReader::read_styles(&mut self.archive)?;

        let mut worksheet = Worksheet::new(entry.name.clone());
        let context = CellContext {
            shared_strings: &shared_strings,
            formats: &formats,
            date_1904: self.date_1904,
        };
        XlsxReader::read_worksheet(&mut self.archive, &entry.path, &mut worksheet, &context)?;
        Ok(worksheet)
    }
}

/// Workbook-level lookups needed to turn a `<c>` element into a value
struct CellContext<'a> {
    shared_strings: &'a [String],
    formats: &'a CellFormats,
    date_1904: bool,
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read every worksheet of a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read every worksheet of a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut package = Package::open(reader)?;
        let shared_strings = Self::read_shared_strings(&mut package.archive)?;
        let formats = Self::read_styles(&mut package.archive)?;
        let context = CellContext {
            shared_strings: &shared_strings,
            formats: &formats,
            date_1904: package.date_1904,
        };

        let mut workbook = Workbook::empty();
        for entry in &package.sheets {
            let mut worksheet = Worksheet::new(entry.name.clone());
            Self::read_worksheet(&mut package.archive, &entry.path, &mut worksheet, &context)?;
            workbook.add_existing_worksheet(worksheet)?;
        }

        Ok(workbook)
    }

    /// List worksheet names in workbook order without decoding any cells
    pub fn sheet_names<R: Read + Seek>(reader: R) -> XlsxResult<Vec<String>> {
        let package = Package::open(reader)?;
        Ok(package.sheets.into_iter().map(|entry| entry.name).collect())
    }

    /// Decode only the worksheet called `name`
    ///
    /// Sheet names are matched exactly; a missing name is
    /// [`XlsxError::SheetNotFound`].
    pub fn read_sheet<R: Read + Seek>(reader: R, name: &str) -> XlsxResult<Worksheet> {
        let mut package = Package::open(reader)?;
        let entry = package
            .sheets
            .iter()
            .find(|entry| entry.name == name)
            .cloned()
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))?;
        package.read_sheet(&entry)
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        // Whitespace inside <t> is significant, so text is not trimmed
        let mut xml_reader = Reader::from_reader(BufReader::new(file));

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    let text = e
                        .unescape()
                        .map_err(|err| XlsxError::Parse(format!("shared string: {}", err)))?;
                    current_string.push_str(&text);
                }
                Ok(Event::CData(e)) if in_t => {
                    current_string.push_str(&String::from_utf8_lossy(&e));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    fn read_styles<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> XlsxResult<CellFormats> {
        match archive.by_name("xl/styles.xml") {
            Ok(file) => read_styles_xml(file),
            Err(_) => Ok(CellFormats::default()),
        }
    }

    /// Read workbook.xml to get sheet names, rIds and the date system
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<(Vec<(String, String)>, bool)> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();
        let mut date_1904 = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"sheet" => {
                        let mut name = None;
                        let mut r_id = None;

                        for attr in e.attributes().flatten() {
                            // `r:id` is the only namespaced attribute named "id"
                            if attr.key.as_ref() == b"name" {
                                name = attr.unescape_value().ok().map(|s| s.to_string());
                            } else if attr.key.local_name().as_ref() == b"id"
                                && attr.key.prefix().is_some()
                            {
                                r_id = attr.unescape_value().ok().map(|s| s.to_string());
                            }
                        }

                        if let (Some(name), Some(r_id)) = (name, r_id) {
                            sheets.push((name, r_id));
                        }
                    }
                    b"workbookPr" => {
                        date_1904 = e
                            .attributes()
                            .flatten()
                            .find(|attr| attr.key.as_ref() == b"date1904")
                            .and_then(|attr| attr.unescape_value().ok())
                            .map_or(false, |v| v.as_ref() == "1" || v.as_ref() == "true");
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok((sheets, date_1904))
    }

    /// Read workbook.xml.rels to get worksheet part paths keyed by rId
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut target = None;
                    let mut rel_type = None;

                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().ok().map(|s| s.to_string());
                        match attr.key.as_ref() {
                            b"Id" => id = value,
                            b"Target" => target = value,
                            b"Type" => rel_type = value,
                            _ => {}
                        }
                    }

                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to the xl/ folder unless absolute
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read a worksheet part into `worksheet`
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        worksheet: &mut Worksheet,
        context: &CellContext<'_>,
    ) -> XlsxResult<()> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));

        let mut buf = Vec::new();

        // Position tracking for rows and cells that omit their `r` attribute
        let mut current_row: Option<u32> = None;
        let mut next_col: u16 = 0;

        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_inline_text = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        current_row = Some(Self::row_index(&e, current_row));
                        next_col = 0;
                    }
                    b"c" => {
                        let pending = PendingCell::start(&e, current_row.unwrap_or(0), next_col)?;
                        next_col = pending.col.saturating_add(1);
                        cell = Some(pending);
                    }
                    b"v" if cell.is_some() => in_value = true,
                    b"rPh" => in_phonetic = true,
                    b"t" if cell.is_some() && !in_phonetic => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        current_row = Some(Self::row_index(&e, current_row));
                        next_col = 0;
                    }
                    b"c" => {
                        // A self-closing cell only carries a style
                        let pending = PendingCell::start(&e, current_row.unwrap_or(0), next_col)?;
                        next_col = pending.col.saturating_add(1);
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            let (row, col) = (pending.row, pending.col);
                            if let Some(value) = pending.finish(context)? {
                                worksheet.set_cell_value_at(row, col, value)?;
                            }
                        }
                    }
                    b"v" => in_value = false,
                    b"rPh" => in_phonetic = false,
                    b"t" => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_value || in_inline_text => {
                    let text = e
                        .unescape()
                        .map_err(|err| XlsxError::Parse(format!("{}: {}", path, err)))?;
                    if let Some(pending) = cell.as_mut() {
                        if in_value {
                            pending.value.get_or_insert_with(String::new).push_str(&text);
                        } else {
                            pending.inline.get_or_insert_with(String::new).push_str(&text);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    fn row_index(e: &BytesStart<'_>, previous: Option<u32>) -> u32 {
        e.attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == b"r")
            .and_then(|attr| attr.unescape_value().ok()?.parse::<u32>().ok())
            .map(|r| r.saturating_sub(1))
            .unwrap_or_else(|| previous.map_or(0, |row| row.saturating_add(1)))
    }
}

/// A `<c>` element being collected
struct PendingCell {
    row: u32,
    col: u16,
    cell_type: Option<String>,
    style: u32,
    value: Option<String>,
    inline: Option<String>,
}

impl PendingCell {
    fn start(e: &BytesStart<'_>, row: u32, col: u16) -> XlsxResult<Self> {
        let mut cell = Self {
            row,
            col,
            cell_type: None,
            style: 0,
            value: None,
            inline: None,
        };

        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map_err(|err| XlsxError::Parse(format!("cell attribute: {}", err)))?;
            match attr.key.as_ref() {
                b"r" => {
                    let addr = CellAddress::parse(&value).map_err(|err| {
                        XlsxError::Parse(format!("Invalid cell reference '{}': {}", value, err))
                    })?;
                    cell.row = addr.row;
                    cell.col = addr.col;
                }
                b"t" => cell.cell_type = Some(value.to_string()),
                b"s" => cell.style = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        if cell.col >= MAX_COLS {
            return Err(XlsxError::Parse(format!(
                "too many cells in row {}",
                cell.row + 1
            )));
        }

        Ok(cell)
    }

    /// Turn the collected text into a cell value (`None` for cells without one)
    fn finish(self, context: &CellContext<'_>) -> XlsxResult<Option<CellValue>> {
        if self.cell_type.as_deref() == Some("inlineStr") {
            return Ok(self
                .inline
                .map(|text| CellValue::String(decode_excel_escapes(&text))));
        }

        let Some(value) = self.value else {
            return Ok(None);
        };

        let cell_value = match self.cell_type.as_deref() {
            Some("s") => {
                let idx: usize = value.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = context.shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                CellValue::String(s.clone())
            }

            Some("b") => CellValue::Boolean(value == "1" || value.eq_ignore_ascii_case("true")),

            Some("e") => CellError::parse(&value)
                .map(CellValue::Error)
                .unwrap_or(CellValue::String(value)),

            // Formula string result
            Some("str") => CellValue::String(decode_excel_escapes(&value)),

            None | Some("n") => match value.trim().parse::<f64>() {
                Ok(n) if context.formats.is_date(self.style) => {
                    let serial = if context.date_1904 {
                        n + DATE_1904_OFFSET
                    } else {
                        n
                    };
                    CellValue::DateTime(serial)
                }
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::String(value),
            },

            // ISO 8601 dates (t="d") and unknown types keep their text
            Some(_) => CellValue::String(value),
        };

        Ok(Some(cell_value))
    }
}
