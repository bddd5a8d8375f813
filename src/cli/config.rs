//! Config subcommand implementation.
//!
//! Handles `ipsift config show` and `ipsift config init`.

use super::Cli;
use crate::config::{AppSettings, Paths};
use crate::error::{CliError, CliResult, ConfigError};
use crate::output;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::Path;

/// Show or initialize the settings file.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Settings file actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings as JSON
    Show,

    /// Write a settings file with the default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the config command.
    pub fn execute(&self, cli: &Cli) -> CliResult<()> {
        match self.action {
            ConfigAction::Show => {
                let settings = cli.load_settings()?;
                let json = serde_json::to_string_pretty(&settings).map_err(ConfigError::from)?;
                println!("{}", json);
                Ok(())
            }
            ConfigAction::Init { force } => {
                let path = match cli.config {
                    Some(ref path) => path.clone(),
                    None => Paths::new()?.settings_file(),
                };
                init_settings(&path, force)?;
                if !cli.quiet {
                    output::print_success(&format!("Settings written to {}", path.display()));
                }
                Ok(())
            }
        }
    }
}

/// Write default settings to `path`, refusing to clobber unless `force`.
fn init_settings(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::Other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ConfigError::from)?;
    }
    AppSettings::default().save_to(path)?;
    Ok(())
}
