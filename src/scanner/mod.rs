//! Scanner module - dispatches probes over a target list.
//!
//! This module ties the probe client, rate limiter and aggregator together
//! into a bounded worker pool running on the tokio runtime.

pub mod aggregator;
pub mod dns;
pub mod probe;
pub mod rate_limiter;
pub mod title;
pub mod traits;

pub use aggregator::Aggregator;
pub use probe::{ProbeClient, SiteProber};
pub use rate_limiter::RateLimiter;
pub use traits::{ProbeResult, Prober, SharedProber};

use crate::types::clamp_workers;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long in-flight probes may keep running after cancellation.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Called with the first result whose title matches the searched one.
pub type MatchHook = Arc<dyn Fn(&ProbeResult) + Send + Sync>;

/// Parameters of one scan run.
#[derive(Clone)]
pub struct ScanJob {
    /// Maximum probes in flight; clamped to [1, 1000].
    pub concurrency: usize,
    /// Title that identifies the searched site, if any.
    pub match_title: Option<String>,
    /// Keep scanning without reporting early matches.
    pub continue_on_match: bool,
    /// Grace period for in-flight probes after cancellation.
    pub drain_timeout: Duration,
    on_match: Option<MatchHook>,
}

impl ScanJob {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            match_title: None,
            continue_on_match: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            on_match: None,
        }
    }

    /// Look for `title`; an empty title disables matching.
    pub fn with_match_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.match_title = (!title.is_empty()).then_some(title);
        self
    }

    pub fn continue_on_match(mut self, enabled: bool) -> Self {
        self.continue_on_match = enabled;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Report the first match as soon as it is found.
    ///
    /// The hook runs on the worker that found the match, at most once per
    /// scan. The scan itself carries on to completion.
    pub fn on_match(mut self, hook: impl Fn(&ProbeResult) + Send + Sync + 'static) -> Self {
        self.on_match = Some(Arc::new(hook));
        self
    }

    fn is_match(&self, result: &ProbeResult) -> bool {
        !self.continue_on_match
            && self
                .match_title
                .as_deref()
                .is_some_and(|title| result.matches_title(title))
    }
}

impl std::fmt::Debug for ScanJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanJob")
            .field("concurrency", &self.concurrency)
            .field("match_title", &self.match_title)
            .field("continue_on_match", &self.continue_on_match)
            .field("drain_timeout", &self.drain_timeout)
            .field("on_match", &self.on_match.is_some())
            .finish()
    }
}

/// What a scan run produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Successful probes, in completion order.
    pub results: Vec<ProbeResult>,
    /// Targets handed to the scan.
    pub total: usize,
    /// Probes that ran to completion.
    pub completed: u64,
    /// First result matching the searched title.
    pub first_match: Option<ProbeResult>,
    /// The scan was cancelled before every target was probed.
    pub interrupted: bool,
    pub duration_ms: u64,
}

/// Probe every target with bounded concurrency.
///
/// The dispatch loop takes a semaphore permit before spawning each task, so
/// at most `job.concurrency` probes are in flight and target order is kept
/// for scheduling. Each task waits for a rate-limiter token, probes, records
/// the outcome in `aggregator` and releases its permit.
///
/// Cancelling `cancel` stops scheduling; in-flight probes get
/// `job.drain_timeout` to finish before they are aborted, and the partial
/// outcome is returned with `interrupted` set.
pub async fn run_scan(
    targets: Vec<String>,
    job: &ScanJob,
    prober: SharedProber,
    limiter: RateLimiter,
    aggregator: Aggregator,
    cancel: CancellationToken,
) -> ScanOutcome {
    let start = Instant::now();
    let total = targets.len();
    let concurrency = clamp_workers(job.concurrency);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();
    let mut interrupted = false;

    info!("Dispatching {} targets with {} workers", total, concurrency);

    for target in targets {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let prober = Arc::clone(&prober);
        let limiter = limiter.clone();
        let aggregator = aggregator.clone();
        let cancel = cancel.clone();
        let job = job.clone();

        tasks.spawn(async move {
            let _permit = permit;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = limiter.wait() => {}
            }

            if let Some(result) = prober.probe(&target).await {
                aggregator.println(result.to_string());
                aggregator.push(result.clone());

                if job.is_match(&result) && aggregator.mark_match(&result) {
                    info!("Match found on {}", result.ip);
                    if let Some(ref hook) = job.on_match {
                        hook(&result);
                    }
                }
            }
            aggregator.advance();
        });
    }

    if !interrupted {
        tokio::select! {
            _ = join_all(&mut tasks) => {}
            _ = cancel.cancelled() => interrupted = true,
        }
    }

    if interrupted {
        debug!("Scan cancelled, draining {} in-flight probes", tasks.len());
        if timeout(job.drain_timeout, join_all(&mut tasks)).await.is_err() {
            warn!(
                "{} probes still running after {:?}, aborting them",
                tasks.len(),
                job.drain_timeout
            );
            tasks.abort_all();
            join_all(&mut tasks).await;
        }
        aggregator.finish("Scan interrupted");
    } else {
        aggregator.finish("Scan complete");
    }

    ScanOutcome {
        results: aggregator.snapshot(),
        total,
        completed: aggregator.completed(),
        first_match: aggregator.first_match(),
        interrupted,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                warn!("Probe task panicked: {}", e);
            }
        }
    }
}
