//! # ipsift - find the servers behind a website
//!
//! ipsift probes every address of a set of IP blocks over HTTP(S), extracts
//! the page title each one serves, and reports which addresses respond. Given
//! a domain, it looks for the addresses serving that domain's page, which
//! finds origin servers hidden behind a CDN or reverse proxy.
//!
//! ## Features
//!
//! - **Flexible Targeting**: comma-separated CIDR blocks, or every block an ASN announces
//! - **Bounded Concurrency**: a semaphore-backed worker pool of up to 1000 probes
//! - **Rate Limiting**: a shared token bucket across all workers
//! - **Virtual Hosts**: requests carry the searched domain as `Host`
//! - **Graceful Interrupts**: Ctrl-C drains in-flight probes and offers to export partial results
//! - **Multiple Output Formats**: plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use ipsift::config::ScanSettings;
//! use ipsift::scanner::{run_scan, Aggregator, ProbeClient, ScanJob};
//! use ipsift::types::expand_blocks;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = ScanSettings::default();
//!     let client = ProbeClient::new(&settings).unwrap();
//!     let title = client.resolve_domain_title("example.com").await.unwrap();
//!
//!     let targets = expand_blocks(&["192.0.2.0/28".to_string()]).unwrap();
//!     let prober = Arc::new(client.into_prober(
//!         Some("example.com".to_string()),
//!         Duration::from_millis(1000),
//!     ));
//!     let job = ScanJob::new(settings.workers).with_match_title(title.title);
//!
//!     let outcome = run_scan(
//!         targets,
//!         &job,
//!         prober,
//!         settings.rate_limiter(),
//!         Aggregator::new(),
//!         CancellationToken::new(),
//!     )
//!     .await;
//!     println!("{} addresses responded", outcome.results.len());
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`types`] - CIDR expansion and input validation
//! - [`scanner`] - Probe client, rate limiter, aggregator and dispatcher
//! - [`asn`] - ASN to IP block lookup
//! - [`interrupt`] - Signal handling and partial-result export
//! - [`config`] - Settings file and per-scan settings
//! - [`output`] - Report rendering and export
//! - [`error`] - Error types

pub mod asn;
pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod output;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use config::ScanSettings;
pub use error::CliError;
pub use output::{OutputFormat, Report};
pub use scanner::{run_scan, ProbeResult, ScanJob, ScanOutcome};
