//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `ipsift scan --ip <blocks> | --asn <ASN>` - Scan IP blocks for websites
//! - `ipsift config show|init` - Inspect or create the settings file

mod config;
mod scan;

pub use config::{ConfigAction, ConfigCommand};
pub use scan::{derive_timeout, ScanCommand};

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ipsift - find the servers behind a website.
///
/// Probes every address of a set of IP blocks, or of the blocks announced by
/// an ASN, over HTTP(S) and reports which ones serve a page, optionally
/// looking for the one that serves a given domain.
#[derive(Parser, Debug)]
#[command(name = "ipsift")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find which addresses in an IP block or ASN serve a website", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan IP blocks or an ASN for websites
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Show or initialize the settings file
    Config(ConfigCommand),
}

impl Cli {
    /// Load settings from `--config`, or from the default location.
    pub fn load_settings(&self) -> CliResult<AppSettings> {
        let settings = match self.config {
            Some(ref path) => AppSettings::load_from(path)?,
            None => AppSettings::load()?,
        };
        Ok(settings)
    }

    /// Run the selected subcommand.
    pub async fn execute(&self) -> CliResult<()> {
        match self.command {
            Commands::Scan(ref cmd) => {
                let settings = self.load_settings()?;
                cmd.execute(&settings, self.quiet).await
            }
            Commands::Config(ref cmd) => cmd.execute(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_requires_one_source() {
        assert!(Cli::try_parse_from(["ipsift", "scan", "-t", "500"]).is_err());
        assert!(Cli::try_parse_from([
            "ipsift", "scan", "--ip", "192.0.2.0/24", "--asn", "AS64500", "-t", "500"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["ipsift", "scan", "--asn", "AS64500", "-t", "500"]).is_ok());
    }

    #[test]
    fn test_scan_flags() {
        let cli = Cli::try_parse_from([
            "ipsift",
            "-v",
            "scan",
            "--ip",
            "192.0.2.0/24,198.51.100.0/30",
            "-d",
            "example.com",
            "-c",
            "--export",
            "--format",
            "json",
            "--workers",
            "50",
            "--rate",
            "20",
            "--dns",
            "1.1.1.1,8.8.8.8",
            "--no-rdns",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Scan(scan) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(scan.ip.as_deref(), Some("192.0.2.0/24,198.51.100.0/30"));
        assert_eq!(scan.domain.as_deref(), Some("example.com"));
        assert!(scan.continue_on_match);
        assert!(scan.export);
        assert_eq!(scan.format, Some(crate::output::OutputFormat::Json));
        assert_eq!(scan.workers, Some(50));
        assert_eq!(scan.rate_limit, Some(20));
        assert_eq!(scan.dns, vec!["1.1.1.1", "8.8.8.8"]);
        assert!(scan.no_rdns);
        assert_eq!(scan.timeout, None);
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::try_parse_from(["ipsift", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommand {
                action: ConfigAction::Init { force: true }
            })
        ));
    }
}
