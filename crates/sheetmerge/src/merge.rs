//! Merging same-named worksheets across files

use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use sheetmerge_core::Workbook;
use sheetmerge_xlsx::XlsxWriter;

use crate::error::{Error, Result};
use crate::extract::extract;
use crate::range::RangeInput;
use crate::source::SourceFile;
use crate::table::{SchemaPolicy, Table};
use crate::COMBINED_SHEET_NAME;

/// Options of a merge run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Treat the first row of each read window as column names
    pub header: bool,
    /// Column handling when tables of one worksheet name differ
    pub schema: SchemaPolicy,
}

/// All rows read for one worksheet name
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSheet {
    pub name: String,
    pub table: Table,
}

/// A (file, worksheet) pair that contributed nothing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SkippedRead {
    pub file: String,
    pub sheet: String,
    pub reason: String,
}

/// What happened during a merge run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MergeReport {
    /// Reads that failed, in the order they were attempted
    pub skipped: Vec<SkippedRead>,
    /// Selected names that produced no rows from any file
    pub empty_sheets: Vec<String>,
    /// Row count of each merged sheet
    pub sheet_rows: Vec<(String, usize)>,
    /// Row count of the combined sheet
    pub total_rows: usize,
}

/// Result of [`merge`]: merged sheets, the combined table and a report
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    sheets: Vec<MergedSheet>,
    grand_total: Option<Table>,
    report: MergeReport,
}

impl MergeOutcome {
    pub fn sheets(&self) -> &[MergedSheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&MergedSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Every merged row, present when at least one sheet was merged
    pub fn grand_total(&self) -> Option<&Table> {
        self.grand_total.as_ref()
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    /// True when nothing was read, so there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Build the output workbook: one sheet per merged name, then the
    /// combined sheet.
    ///
    /// A name already taken in the output, ignoring case, gets a numeric
    /// suffix (see [`Workbook::unique_sheet_name`]).
    pub fn to_workbook(&self) -> Result<Workbook> {
        let mut workbook = Workbook::empty();
        let names = self
            .sheets
            .iter()
            .map(|sheet| (sheet.name.as_str(), &sheet.table))
            .chain(self.grand_total.iter().map(|total| (COMBINED_SHEET_NAME, total)));

        for (name, table) in names {
            let unique = workbook.unique_sheet_name(name);
            if unique != name {
                log::warn!("sheet name '{}' already used, writing it as '{}'", name, unique);
            }
            workbook.add_existing_worksheet(table.to_worksheet(&unique)?)?;
        }
        Ok(workbook)
    }

    /// Write the output workbook as XLSX.
    ///
    /// Returns `false` without touching `writer` when the outcome is empty.
    pub fn write<W: Write + Seek>(&self, writer: W) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let workbook = self.to_workbook()?;
        XlsxWriter::write(&workbook, writer)?;
        Ok(true)
    }

    /// Save the output workbook to `path`.
    ///
    /// No file is created for an empty outcome. A partly written file is
    /// removed when writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        if self.is_empty() {
            log::warn!("nothing to write, {} not created", path.display());
            return Ok(None);
        }

        let workbook = self.to_workbook()?;
        let file = File::create(path)?;
        let result = XlsxWriter::write(&workbook, file);
        if let Err(e) = result {
            if let Err(remove_err) = std::fs::remove_file(path) {
                log::debug!("could not remove {}: {}", path.display(), remove_err);
            }
            return Err(e.into());
        }

        log::info!(
            "wrote {} ({} sheets, {} rows combined)",
            path.display(),
            workbook.sheet_count(),
            self.report.total_rows
        );
        Ok(Some(path.to_path_buf()))
    }
}

/// Merge the worksheets named in `sheets` across `files`.
///
/// The range is parsed first; a malformed range fails before any file is
/// read. For each name, the tables read from every file (in file order) are
/// stacked into one sheet, and all sheets are stacked into the combined
/// table. Files that lack a name or cannot be read are skipped and listed in
/// the report. Duplicate names are merged once.
pub fn merge(
    files: &[SourceFile],
    sheets: &[String],
    range: &RangeInput,
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let spec = range.parse()?;
    let mut outcome = MergeOutcome::default();

    let mut selected: Vec<&str> = Vec::with_capacity(sheets.len());
    for name in sheets {
        if selected.contains(&name.as_str()) {
            log::warn!("worksheet '{}' selected more than once, merging it once", name);
        } else {
            selected.push(name);
        }
    }

    for &name in &selected {
        let mut tables = Vec::new();
        for file in files {
            match extract(file, name, &spec, options.header) {
                Ok(table) => {
                    log::info!(
                        "read {} rows from '{}' / '{}'",
                        table.row_count(),
                        file.name(),
                        name
                    );
                    tables.push(table);
                }
                Err(e) => {
                    log::warn!("skipping: {}", e);
                    outcome.report.skipped.push(SkippedRead {
                        file: e.file,
                        sheet: e.sheet,
                        reason: e.kind.to_string(),
                    });
                }
            }
        }

        if tables.is_empty() {
            log::warn!("worksheet '{}' produced no data in any file", name);
            outcome.report.empty_sheets.push(name.to_string());
            continue;
        }

        let table = Table::concat(tables, options.schema).map_err(|source| {
            Error::SchemaMismatch {
                sheet: name.to_string(),
                source,
            }
        })?;
        outcome
            .report
            .sheet_rows
            .push((name.to_string(), table.row_count()));
        outcome.sheets.push(MergedSheet {
            name: name.to_string(),
            table,
        });
    }

    if !outcome.sheets.is_empty() {
        let total = Table::concat(
            outcome.sheets.iter().map(|s| s.table.clone()),
            SchemaPolicy::Union,
        )
        .map_err(|source| Error::SchemaMismatch {
            sheet: COMBINED_SHEET_NAME.to_string(),
            source,
        })?;
        outcome.report.total_rows = total.row_count();
        outcome.grand_total = Some(total);
    }

    Ok(outcome)
}
