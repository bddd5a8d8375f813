use anyhow::Result;
use clap::Parser;
use ipsift::cli::Cli;
use ipsift::error::{CliError, ResolveError};
use ipsift::output;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            if let Some(CliError::Resolve(ResolveError::DomainUnreachable(_))) =
                e.downcast_ref::<CliError>()
            {
                eprintln!("  - Domain is accessible via HTTP/HTTPS");
                eprintln!("  - No network/firewall issues");
                eprintln!("  - Domain name is correct");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    cli.execute().await?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` shows debug detail and `-q` only errors.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("ipsift=debug")
        } else if quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
