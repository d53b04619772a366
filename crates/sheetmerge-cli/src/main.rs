//! sheetmerge CLI - merge same-named worksheets across workbooks

mod logger;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sheetmerge::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetmerge")]
#[command(
    author,
    version,
    about = "Merge same-named worksheets from many Excel workbooks into one"
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the worksheet names of a workbook
    Sheets {
        /// Input workbook (xlsx, xlsm, xls)
        input: PathBuf,
    },

    /// Merge worksheets across workbooks into one summary workbook
    Merge {
        /// Input workbooks, merged in the order given
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Worksheet name to merge (repeatable)
        #[arg(short, long = "sheet", value_name = "NAME")]
        sheets: Vec<String>,

        /// Merge every worksheet of the first input
        #[arg(long, conflicts_with = "sheets")]
        all_sheets: bool,

        /// Top-left cell of the block to read, e.g. A1
        #[arg(long, default_value = "")]
        start: String,

        /// Bottom-right cell of the block to read, e.g. D10 (default: start)
        #[arg(long, default_value = "")]
        end: String,

        /// Use the first row of the block as column names
        #[arg(long)]
        header: bool,

        /// Fail when files disagree on the columns of a worksheet
        #[arg(long)]
        strict: bool,

        /// Output workbook
        #[arg(short, long, default_value = OUTPUT_FILE_NAME)]
        output: PathBuf,

        /// Write a JSON report of the run
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(logger::level_filter(cli.verbose, cli.quiet));

    match cli.command {
        Commands::Sheets { input } => list_sheets(&input),
        Commands::Merge {
            inputs,
            sheets,
            all_sheets,
            start,
            end,
            header,
            strict,
            output,
            report,
        } => {
            let options = MergeOptions {
                header,
                schema: if strict {
                    SchemaPolicy::Strict
                } else {
                    SchemaPolicy::Union
                },
            };
            run_merge(
                &inputs,
                sheets,
                all_sheets,
                &RangeInput::new(start, end),
                &options,
                &output,
                report.as_deref(),
            )
        }
    }
}

fn open_source(path: &Path) -> Result<SourceFile> {
    SourceFile::open(path).with_context(|| format!("Failed to open '{}'", path.display()))
}

fn list_sheets(input: &Path) -> Result<()> {
    let file = open_source(input)?;
    let names = file
        .sheet_names()
        .with_context(|| format!("Failed to read sheets of '{}'", input.display()))?;

    for (i, name) in names.iter().enumerate() {
        println!("{}\t{}", i, name);
    }
    Ok(())
}

fn run_merge(
    inputs: &[PathBuf],
    sheets: Vec<String>,
    all_sheets: bool,
    range: &RangeInput,
    options: &MergeOptions,
    output: &Path,
    report_path: Option<&Path>,
) -> Result<()> {
    // Fail on a bad range before reading any input
    range.parse().context("Invalid cell range")?;

    let files = inputs
        .iter()
        .map(|path| open_source(path))
        .collect::<Result<Vec<_>>>()?;

    let sheets = if all_sheets {
        sheetmerge::first_file_sheets(&files).context("Failed to list worksheets")?
    } else {
        sheets
    };
    if sheets.is_empty() {
        bail!("No worksheets selected; pass --sheet NAME or --all-sheets");
    }

    let outcome = merge(&files, &sheets, range, options).context("Merge failed")?;

    if let Some(path) = report_path {
        write_report(outcome.report(), path)?;
    }

    match outcome
        .save(output)
        .with_context(|| format!("Failed to write '{}'", output.display()))?
    {
        Some(path) => log::info!(
            "Merged {} worksheets ({} rows) into '{}'",
            outcome.sheets().len(),
            outcome.report().total_rows,
            path.display()
        ),
        None => log::warn!("No data found in the selected worksheets; nothing written"),
    }
    Ok(())
}

fn write_report(report: &MergeReport, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;
    Ok(())
}
