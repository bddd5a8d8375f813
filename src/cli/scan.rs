//! Scan subcommand implementation.
//!
//! Handles `ipsift scan`: resolves the searched domain and the IP blocks,
//! runs the dispatcher, then prints and optionally exports the report.

use crate::asn;
use crate::config::{AppSettings, ScanSettings};
use crate::error::{CliError, CliResult};
use crate::interrupt::{self, InterruptListener};
use crate::output::{
    self, OutputFormat, Report, ScanSummary, METHOD_ALL, METHOD_INTERRUPTED, METHOD_MATCH,
};
use crate::scanner::{run_scan, Aggregator, ProbeClient, ProbeResult, ScanJob, SharedProber};
use crate::types::{
    clamp_timeout, expand_blocks, parse_block_list, validate_domain, Asn,
};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Scan IP blocks or an ASN for websites.
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["ip", "asn"])))]
pub struct ScanCommand {
    /// Comma-separated IP blocks (e.g. "103.21.244.0/22,103.22.200.0/22")
    #[arg(long, value_name = "BLOCKS")]
    pub ip: Option<String>,

    /// Scan every block announced by this ASN (e.g. AS13335)
    #[arg(long, value_name = "ASN")]
    pub asn: Option<String>,

    /// Domain to look for; its page title is the match key
    #[arg(short = 'd', long)]
    pub domain: Option<String>,

    /// Per-request timeout in milliseconds (derived from the domain when omitted)
    #[arg(short = 't', long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Keep scanning without an early report when the domain is found
    #[arg(short = 'c', long = "continue")]
    pub continue_on_match: bool,

    /// Export reports without asking
    #[arg(long)]
    pub export: bool,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum concurrent probes (1-1000)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Proxy URL (http, https or socks5)
    #[arg(long, env = "IPSIFT_PROXY")]
    pub proxy: Option<String>,

    /// Requests per second (0 = unlimited)
    #[arg(long = "rate", value_name = "N")]
    pub rate_limit: Option<u32>,

    /// Requests allowed in a burst (defaults to the rate)
    #[arg(long, value_name = "N")]
    pub burst: Option<u32>,

    /// Retries per URL after the first attempt
    #[arg(long)]
    pub retries: Option<u32>,

    /// Comma-separated DNS servers to use instead of the system resolver
    #[arg(long, value_delimiter = ',', value_name = "SERVERS")]
    pub dns: Vec<String>,

    /// Skip reverse DNS lookups of responsive addresses
    #[arg(long)]
    pub no_rdns: bool,

    /// Directory for exported reports
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Where the blocks to scan come from.
enum Source {
    Blocks(Vec<String>),
    Asn(Asn),
}

/// Scan timeout derived from the searched domain's response time: +15%.
pub fn derive_timeout(response_ms: u64) -> u64 {
    response_ms + response_ms * 15 / 100
}

impl ScanCommand {
    /// Apply command-line overrides on top of the stored settings.
    pub fn scan_settings(&self, app: &AppSettings) -> ScanSettings {
        let mut settings = app.to_scan_settings();

        if let Some(workers) = self.workers {
            settings = settings.with_workers(workers);
        }
        if self.rate_limit.is_some() || self.burst.is_some() {
            let rate = self.rate_limit.unwrap_or(settings.rate_limit);
            let burst = self.burst.unwrap_or(settings.burst);
            settings = settings.with_rate_limit(rate, burst);
        }
        if let Some(retries) = self.retries {
            settings = settings.with_max_retries(retries);
        }
        if self.proxy.is_some() {
            settings = settings.with_proxy(self.proxy.clone());
        }
        if !self.dns.is_empty() {
            settings = settings.with_dns_servers(self.dns.clone());
        }
        if self.no_rdns {
            settings = settings.with_reverse_dns(false);
        }
        if let Some(format) = self.format {
            settings = settings.with_format(format);
        }

        settings
    }

    /// Directory for exported reports: `--output-dir`, then the settings
    /// file, then the working directory.
    pub fn export_dir(&self, app: &AppSettings) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| app.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn source(&self) -> CliResult<Source> {
        match (&self.ip, &self.asn) {
            (Some(blocks), None) => Ok(Source::Blocks(parse_block_list(blocks)?)),
            (None, Some(asn)) => Ok(Source::Asn(Asn::parse(asn)?)),
            _ => Err(CliError::Other(
                "exactly one of --ip or --asn is required".to_string(),
            )),
        }
    }

    /// Execute the scan command.
    pub async fn execute(&self, app: &AppSettings, quiet: bool) -> CliResult<()> {
        let settings = self.scan_settings(app);
        let source = self.source()?;
        let domain = self.domain.as_deref().map(validate_domain).transpose()?;

        if self.timeout.is_none() && domain.is_none() {
            return Err(CliError::Other(
                "timeout (-t) is not set; pass a domain (-d) to have it derived automatically"
                    .to_string(),
            ));
        }

        debug!(
            "Configuration - Workers: {}, Rate Limit: {}/s, Proxy: {:?}",
            settings.workers, settings.rate_limit, settings.proxy
        );
        if !settings.dns_servers.is_empty() {
            debug!("Custom DNS servers: {:?}", settings.dns_servers);
        }

        let client = ProbeClient::new(&settings)?;

        let mut match_title = None;
        let mut derived_ms = None;
        if let Some(ref domain) = domain {
            if !quiet {
                output::print_info(&format!("Resolving {}", domain));
            }
            let resolved = client.resolve_domain_title(domain).await?;
            info!(
                "Domain title: {} ({}ms)",
                resolved.title, resolved.elapsed_ms
            );
            derived_ms = Some(derive_timeout(resolved.elapsed_ms));
            match_title = Some(resolved.title);
        }
        let timeout_ms = clamp_timeout(self.timeout.or(derived_ms).unwrap_or_default());

        let (asn, blocks) = match source {
            Source::Blocks(blocks) => (None, blocks),
            Source::Asn(asn) => {
                let blocks = asn::fetch_routes(&client, &asn).await?;
                (Some(asn), blocks)
            }
        };
        let targets = expand_blocks(&blocks)?;
        if targets.is_empty() {
            return Err(CliError::Other("no addresses to scan".to_string()));
        }

        if !quiet {
            output::print_scan_header(&ScanSummary {
                asn: asn.as_ref().map(Asn::to_string),
                blocks: blocks.len(),
                addresses: targets.len(),
                timeout_ms,
                workers: settings.workers,
            });
        }

        let output_dir = self.export_dir(app);

        let template = Report::new(METHOD_ALL, timeout_ms, blocks, Vec::new())
            .with_search(domain.as_deref(), match_title.as_deref());

        let aggregator = if quiet {
            Aggregator::new()
        } else {
            Aggregator::new().with_progress(targets.len() as u64)
        };

        let format = settings.format;
        let export = self.export;
        let reporter = MatchReporter::new(
            template.clone(),
            format,
            export.then(|| output_dir.clone()),
            aggregator.clone(),
        );

        let mut job = ScanJob::new(settings.workers).continue_on_match(self.continue_on_match);
        if let Some(ref title) = match_title {
            job = job.with_match_title(title.clone());
        }
        let hook_reporter = reporter.clone();
        job = job.on_match(move |result| hook_reporter.report(result));

        let prober: SharedProber = Arc::new(
            client.into_prober(domain.clone(), Duration::from_millis(timeout_ms)),
        );

        let listener = InterruptListener::spawn(CancellationToken::new());
        let outcome = run_scan(
            targets,
            &job,
            prober,
            settings.rate_limiter(),
            aggregator,
            listener.token(),
        )
        .await;
        listener.scan_finished();
        reporter.wait_for_exports().await;

        info!(
            "Probed {} of {} addresses in {:.2}s, {} responded",
            outcome.completed,
            outcome.total,
            outcome.duration_ms as f64 / 1000.0,
            outcome.results.len()
        );

        if outcome.interrupted {
            let report = Report {
                method: METHOD_INTERRUPTED.to_string(),
                results: outcome.results,
                ..template
            };
            interrupt::handle_interrupt(&report, format, export, &output_dir)?;
            return Ok(());
        }

        let report = Report {
            results: outcome.results,
            ..template
        };
        output::deliver_report(&report, format, export, &output_dir)?;

        Ok(())
    }
}

/// Reports an early match while the scan keeps running.
///
/// Runs on a scan worker, so it never prompts. Exports go to the blocking pool.
#[derive(Clone)]
struct MatchReporter {
    template: Report,
    format: OutputFormat,
    export_dir: Option<PathBuf>,
    aggregator: Aggregator,
    exports: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MatchReporter {
    fn new(
        template: Report,
        format: OutputFormat,
        export_dir: Option<PathBuf>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            template,
            format,
            export_dir,
            aggregator,
            exports: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn report(&self, result: &ProbeResult) {
        let report = Report {
            method: METHOD_MATCH.to_string(),
            results: vec![result.clone()],
            ..self.template.clone()
        };
        match output::render(&report, self.format) {
            Ok(rendered) => self.aggregator.println(format!("\n{}", rendered)),
            Err(e) => {
                output::print_error(&e.to_string());
                return;
            }
        }

        let Some(dir) = self.export_dir.clone() else {
            return;
        };
        let format = self.format;
        let aggregator = self.aggregator.clone();
        let handle = tokio::task::spawn_blocking(move || {
            match output::export_report(&report, format, &dir) {
                Ok(path) => aggregator.println(output::success_line(&format!(
                    "Successfully exported: {}",
                    path.display()
                ))),
                Err(e) => output::print_error(&e.to_string()),
            }
        });
        self.pending().push(handle);
    }

    /// Wait for every export started by [`report`](Self::report).
    async fn wait_for_exports(&self) {
        let handles = std::mem::take(&mut *self.pending());
        for handle in handles {
            if let Err(e) = handle.await {
                debug!("Match export task failed: {}", e);
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.exports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
