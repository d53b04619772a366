//! Input workbooks held in memory

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use sheetmerge_core::Worksheet;
use sheetmerge_xls::{XlsError, XlsReader};
use sheetmerge_xlsx::{XlsxError, XlsxReader};

use crate::error::{Error, Result};
use crate::extract::SheetReadErrorKind;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Spreadsheet container format, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Xlsm,
    Xls,
}

impl SourceFormat {
    /// Format for a file name, matching the extension case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("xlsx") => Some(SourceFormat::Xlsx),
            Some("xlsm") => Some(SourceFormat::Xlsm),
            Some("xls") => Some(SourceFormat::Xls),
            _ => None,
        }
    }

    fn is_open_xml(self) -> bool {
        matches!(self, SourceFormat::Xlsx | SourceFormat::Xlsm)
    }
}

/// One uploaded workbook: its file name and raw bytes
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    format: SourceFormat,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    /// Wrap file content under its file name.
    ///
    /// Only `.xlsx`, `.xlsm` and `.xls` names are accepted.
    pub fn new<S: Into<String>, B: Into<Vec<u8>>>(name: S, bytes: B) -> Result<Self> {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        let format =
            SourceFormat::from_name(&name).ok_or_else(|| Error::UnsupportedFormat(name.clone()))?;
        Ok(Self {
            name,
            format,
            bytes: Arc::from(bytes),
        })
    }

    /// Read a file from disk; its file name becomes the provenance name
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if SourceFormat::from_name(&name).is_none() {
            return Err(Error::UnsupportedFormat(name));
        }
        let bytes = std::fs::read(path)?;
        Self::new(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        if self.is_open_xml() {
            Ok(XlsxReader::sheet_names(self.cursor())?)
        } else {
            Ok(XlsReader::sheet_names(self.cursor())?)
        }
    }

    /// Decode the worksheet called `sheet` and nothing else
    pub(crate) fn read_worksheet(
        &self,
        sheet: &str,
    ) -> std::result::Result<Worksheet, SheetReadErrorKind> {
        if self.is_open_xml() {
            XlsxReader::read_sheet(self.cursor(), sheet).map_err(|e| match e {
                XlsxError::SheetNotFound(_) => SheetReadErrorKind::SheetNotFound,
                e => SheetReadErrorKind::Xlsx(e),
            })
        } else {
            XlsReader::read_sheet(self.cursor(), sheet).map_err(|e| match e {
                XlsError::SheetNotFound(_) => SheetReadErrorKind::SheetNotFound,
                e => SheetReadErrorKind::Xls(e),
            })
        }
    }

    /// Container type, trusting the leading magic bytes over the extension
    fn is_open_xml(&self) -> bool {
        if self.bytes.starts_with(ZIP_MAGIC) {
            true
        } else if self.bytes.starts_with(CFB_MAGIC) {
            false
        } else {
            self.format.is_open_xml()
        }
    }

    fn cursor(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.bytes[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name() {
        assert_eq!(SourceFormat::from_name("a.xlsx"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_name("报表.XLSM"), Some(SourceFormat::Xlsm));
        assert_eq!(SourceFormat::from_name("old.Xls"), Some(SourceFormat::Xls));
        assert_eq!(SourceFormat::from_name("data.csv"), None);
        assert_eq!(SourceFormat::from_name("xlsx"), None);
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let err = SourceFile::new("notes.txt", b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(name) if name == "notes.txt"));
    }

    #[test]
    fn test_magic_overrides_extension() {
        let zip_named_xls = SourceFile::new("mislabeled.xls", b"PK\x03\x04rest".to_vec()).unwrap();
        assert!(zip_named_xls.is_open_xml());

        let mut cfb = CFB_MAGIC.to_vec();
        cfb.extend_from_slice(&[0; 8]);
        let cfb_named_xlsx = SourceFile::new("mislabeled.xlsx", cfb).unwrap();
        assert!(!cfb_named_xlsx.is_open_xml());

        let unknown = SourceFile::new("short.xlsm", b"??".to_vec()).unwrap();
        assert!(unknown.is_open_xml());
    }

    #[test]
    fn test_garbage_bytes_fail_as_decoder_errors() {
        let file = SourceFile::new("broken.xlsx", b"not a workbook".to_vec()).unwrap();
        assert!(matches!(
            file.read_worksheet("Sheet1"),
            Err(SheetReadErrorKind::Xlsx(_))
        ));
        assert!(file.sheet_names().is_err());

        let file = SourceFile::new("broken.xls", b"not a workbook".to_vec()).unwrap();
        assert!(matches!(
            file.read_worksheet("Sheet1"),
            Err(SheetReadErrorKind::Xls(_))
        ));
    }
}
