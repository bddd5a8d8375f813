//! Error types for ipsift.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-probe failures are
//! never surfaced as errors; everything here aborts an operation before or
//! after the scan itself.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::types::TargetError;

/// Errors raised while building the probe client.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid proxy URL '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("invalid DNS server address: {0}")]
    InvalidDnsServer(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Errors raised while resolving the inputs of a scan.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("domain '{0}' did not respond over HTTPS or HTTP, with or without www")]
    DomainUnreachable(String),

    #[error("route lookup for {0} did not respond")]
    AsnLookupFailed(String),

    #[error("no IP blocks found for {0}")]
    NoRoutes(String),
}

/// Errors related to configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read config file '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write config file '{path}': {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid config format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while rendering or exporting a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to render report: {0}")]
    Render(String),

    #[error("failed to write export file '{path}': {reason}")]
    ExportFailed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Render(e.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(e: csv::Error) -> Self {
        Self::Render(e.to_string())
    }
}

/// Top-level error for CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
