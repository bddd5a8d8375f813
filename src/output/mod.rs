//! Output formatting module.
//!
//! Renders scan reports as plain text, JSON or CSV, writes them to export
//! files, and holds the console helpers used for everything the user reads.

mod csv_format;
mod json_format;
mod plain;

pub use plain::{
    print_error, print_info, print_scan_header, print_success, print_warning, success_line,
    ScanSummary,
};

use crate::error::{ReportError, ReportResult};
use crate::scanner::ProbeResult;
use crate::types::sanitize_filename;
use chrono::{DateTime, Local, SecondsFormat};
use console::Term;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Method label of a report emitted for an early title match.
pub const METHOD_MATCH: &str = "Search Domain by ASN";
/// Method label of the final report over every result.
pub const METHOD_ALL: &str = "Search All ASN/IP";
/// Method label of a report built from an interrupted scan.
pub const METHOD_INTERRUPTED: &str = "Search Interrupted";

/// Output format for reports.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Text,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl OutputFormat {
    /// File extension used for exports.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Everything a report shows about one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub method: String,
    /// Title of the searched site, when a domain was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_site: Option<String>,
    /// The searched domain; names the export file.
    #[serde(skip)]
    pub domain: Option<String>,
    pub timeout_ms: u64,
    pub ip_blocks: Vec<String>,
    pub results: Vec<ProbeResult>,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

impl Report {
    /// Create a report stamped with the current time.
    pub fn new(
        method: impl Into<String>,
        timeout_ms: u64,
        ip_blocks: Vec<String>,
        results: Vec<ProbeResult>,
    ) -> Self {
        Self {
            method: method.into(),
            search_site: None,
            domain: None,
            timeout_ms,
            ip_blocks,
            results,
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }

    /// Attach the searched domain and its title. Empty values are dropped.
    pub fn with_search(mut self, domain: Option<&str>, title: Option<&str>) -> Self {
        self.domain = domain.filter(|d| !d.is_empty()).map(str::to_string);
        self.search_site = title.filter(|t| !t.is_empty()).map(str::to_string);
        self
    }

    /// Creation time as a unix timestamp, falling back to now.
    fn unix_time(&self) -> i64 {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.timestamp())
            .unwrap_or_else(|_| Local::now().timestamp())
    }
}

/// Render a report in the given format.
pub fn render(report: &Report, format: OutputFormat) -> ReportResult<String> {
    match format {
        OutputFormat::Text => Ok(plain::render_text(report)),
        OutputFormat::Json => json_format::render_json(report),
        OutputFormat::Csv => csv_format::render_csv(report),
    }
}

/// Print a report to stdout.
pub fn print_report(report: &Report, format: OutputFormat) -> ReportResult<()> {
    let rendered = render(report, format)?;
    println!();
    println!("{}", rendered);
    Ok(())
}

/// Export file name: `ipsift_<domain>_<unix>.<ext>`, or
/// `ipsift_<unix>_export.<ext>` without a domain.
pub fn export_file_name(domain: Option<&str>, unix_time: i64, format: OutputFormat) -> String {
    let safe = domain.map(sanitize_filename).filter(|d| !d.is_empty());
    match safe {
        Some(domain) => format!("ipsift_{}_{}.{}", domain, unix_time, format.extension()),
        None => format!("ipsift_{}_export.{}", unix_time, format.extension()),
    }
}

/// Write a report into `dir`, returning the created file.
pub fn export_report(report: &Report, format: OutputFormat, dir: &Path) -> ReportResult<PathBuf> {
    let rendered = render(report, format)?;

    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(
        report.domain.as_deref(),
        report.unix_time(),
        format,
    ));
    debug!("Exporting report to {}", path.display());

    fs::write(&path, rendered).map_err(|e| ReportError::ExportFailed {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(path)
}

/// Interpret an answer to the export prompt: blank, `y` and `Y` mean yes.
pub fn parse_confirmation(input: &str) -> bool {
    matches!(input.trim(), "" | "y" | "Y")
}

/// Ask whether to export. An unreadable terminal counts as "no".
pub fn confirm_export() -> bool {
    let term = Term::stdout();
    if term.write_str("\nDo you want to export the result to a file? (Y/n): ").is_err() {
        return false;
    }
    let answer = if term.is_term() {
        term.read_line()
    } else {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    };
    match answer {
        Ok(answer) => parse_confirmation(&answer),
        Err(e) => {
            debug!("Could not read export answer: {}", e);
            false
        }
    }
}

/// Print a report, then export it when `export` is set or the user agrees.
pub fn deliver_report(
    report: &Report,
    format: OutputFormat,
    export: bool,
    dir: &Path,
) -> ReportResult<Option<PathBuf>> {
    print_report(report, format)?;

    if !export && !confirm_export() {
        print_info("Export canceled");
        return Ok(None);
    }

    let path = export_report(report, format, dir)?;
    print_success(&format!("Successfully exported: {}", path.display()));
    Ok(Some(path))
}
