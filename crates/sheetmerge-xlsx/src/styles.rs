//! Cell format table from `xl/styles.xml`
//!
//! Only the number format of each `cellXfs` entry is kept, which is all
//! that is needed to tell date cells from plain numbers.

use std::collections::HashMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use sheetmerge_core::NumberFormat;

use crate::error::{XlsxError, XlsxResult};

/// Number formats indexed by cell style (`s` attribute) index
#[derive(Debug, Default)]
pub(crate) struct CellFormats {
    formats: Vec<NumberFormat>,
}

impl CellFormats {
    /// Whether the style at `index` formats numbers as dates or times
    pub(crate) fn is_date(&self, index: u32) -> bool {
        self.formats
            .get(index as usize)
            .map_or(false, NumberFormat::is_date_format)
    }
}

fn attr_u32(e: &BytesStart<'_>, name: &[u8]) -> Option<u32> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok()?.parse().ok())
}

pub(crate) fn read_styles_xml<R: Read>(reader: R) -> XlsxResult<CellFormats> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_format_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    xf_format_ids.push(attr_u32(&e, b"numFmtId").unwrap_or(0));
                }
                b"numFmt" => {
                    let id = attr_u32(&e, b"numFmtId");
                    let code = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.as_ref() == b"formatCode")
                        .and_then(|attr| attr.unescape_value().ok().map(|s| s.to_string()));
                    if let (Some(id), Some(code)) = (id, code) {
                        custom.insert(id, code);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let formats = xf_format_ids
        .into_iter()
        .map(|id| NumberFormat::resolve(id, custom.get(&id).map(String::as_str)))
        .collect();

    Ok(CellFormats { formats })
}
