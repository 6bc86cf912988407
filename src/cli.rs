use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Explore inventory spreadsheets: detect headers and column roles, filter, summarize and export",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the sheets of a workbook or delimited file
    Sheets(SheetsArgs),
    /// Show which column was resolved for each role
    Roles(RolesArgs),
    /// List the selectable values of a role's column
    Values(ValuesArgs),
    /// Print the filtered rows of a sheet as a table
    View(ViewArgs),
    /// Summarize the filtered rows: totals, status, top categories, monthly series
    Summary(SummaryArgs),
    /// Write the filtered rows to an xlsx workbook or delimited file
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input workbook (xlsx, xlsm, xls, ods) or delimited text file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML profile with role keywords, status vocabulary and header thresholds
    #[arg(short = 'p', long = "profile")]
    pub profile: Option<PathBuf>,
    /// Delimiter for text inputs (supports ',', 'tab', ';', '|'); sniffed when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SheetArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Sheet to use (defaults to the profile's preferred sheet, else the first)
    #[arg(short = 's', long = "sheet")]
    pub sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Role selections such as `status=EM USO|EM ESTOQUE` (repeatable)
    #[arg(long = "select", action = clap::ArgAction::Append)]
    pub selections: Vec<String>,
    /// Case-insensitive text that must appear in some cell of the row
    #[arg(long = "search")]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct SheetsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct RolesArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
}

#[derive(Debug, Args)]
pub struct ValuesArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    /// Role whose values are listed (item, status, brand, model, user, location, date)
    #[arg(short = 'r', long = "role")]
    pub role: String,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Maximum number of rows printed
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Emit the summary as pretty-printed JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Output file; `.csv`/`.tsv` write delimited text, anything else xlsx
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Worksheet name inside the exported workbook
    #[arg(long = "sheet-name", default_value = "Filtered")]
    pub sheet_name: String,
    /// Delimiter for delimited output (defaults from the output extension)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Write every loaded sheet, unfiltered, into one workbook
    #[arg(long = "all-sheets", conflicts_with_all = ["selections", "search", "sheet"])]
    pub all_sheets: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
