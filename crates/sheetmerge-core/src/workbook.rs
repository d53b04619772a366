//! Workbook type - an ordered collection of named worksheets

use crate::error::{Error, Result};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook (spreadsheet document)
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
}

impl Workbook {
    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(Worksheet::name).collect()
    }

    /// Add a new, empty worksheet with the given name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Add an already populated worksheet
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;

        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        Ok(index)
    }

    /// A name for a new sheet that no existing sheet already takes.
    ///
    /// Names are compared case-insensitively. A taken name gets a number one
    /// above the highest numeric suffix already used for it, so "Sheet1"
    /// next to "sheet1" becomes "Sheet11", and "合并总表" becomes "合并总表1".
    /// The base is shortened when the suffix would exceed the length limit.
    pub fn unique_sheet_name(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        let taken: Vec<String> = self
            .worksheets
            .iter()
            .map(|ws| ws.name().to_lowercase())
            .collect();
        if !taken.contains(&lower) {
            return name.to_string();
        }

        let highest = taken
            .iter()
            .filter_map(|existing| existing.strip_prefix(lower.as_str()))
            .filter(|count| !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|count| count.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        let suffix = (highest + 1).to_string();
        let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.len());
        let base: String = name.chars().take(keep).collect();
        format!("{}{}", base, suffix)
    }

    /// Validate a sheet name against Excel's rules and the existing sheets
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters): {}",
                MAX_SHEET_NAME_LEN, name
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}': {}",
                c, name
            )));
        }

        // Excel compares sheet names case-insensitively
        let name_lower = name.to_lowercase();
        if self
            .worksheets
            .iter()
            .any(|ws| ws.name().to_lowercase() == name_lower)
        {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}
