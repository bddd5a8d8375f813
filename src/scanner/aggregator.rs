//! Shared collection of probe outcomes.
//!
//! Every worker writes here; the interrupt path and the final report read
//! snapshots. Results, the completed counter and the match flag live under a
//! single mutex, which is never held across I/O.

use crate::scanner::traits::ProbeResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ScanState {
    results: Vec<ProbeResult>,
    completed: u64,
    first_match: Option<ProbeResult>,
}

/// Thread-safe scan state shared by the dispatcher's workers.
///
/// Results are kept in completion order, not target order.
#[derive(Clone, Default)]
pub struct Aggregator {
    state: Arc<Mutex<ScanState>>,
    progress: Option<ProgressBar>,
}

impl Aggregator {
    /// Create an empty aggregator with no progress display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a progress bar sized to `total` targets.
    pub fn with_progress(mut self, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        self.progress = Some(pb);
        self
    }

    /// Append a successful probe.
    pub fn push(&self, result: ProbeResult) {
        if let Some(ref pb) = self.progress {
            pb.set_message(format!("Found: {} ({})", result.ip, result.title));
        }
        self.lock().results.push(result);
    }

    /// Count one finished probe, successful or not.
    pub fn advance(&self) {
        self.lock().completed += 1;
        if let Some(ref pb) = self.progress {
            pb.inc(1);
        }
    }

    /// Record `result` as the match. Returns `true` only for the first caller;
    /// once set, the match is never replaced.
    pub fn mark_match(&self, result: &ProbeResult) -> bool {
        let mut state = self.lock();
        if state.first_match.is_some() {
            return false;
        }
        state.first_match = Some(result.clone());
        true
    }

    /// Whether a match has been recorded.
    pub fn match_found(&self) -> bool {
        self.lock().first_match.is_some()
    }

    /// The first recorded match, if any.
    pub fn first_match(&self) -> Option<ProbeResult> {
        self.lock().first_match.clone()
    }

    /// Copy of the results collected so far.
    pub fn snapshot(&self) -> Vec<ProbeResult> {
        self.lock().results.clone()
    }

    /// Number of successful probes so far.
    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    /// Whether no probe has succeeded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of finished probes so far.
    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    /// Print a line above the progress bar without garbling it.
    pub fn println(&self, line: impl AsRef<str>) {
        match self.progress {
            Some(ref pb) => pb.println(line),
            None => println!("{}", line.as_ref()),
        }
    }

    /// Stop drawing the progress bar.
    pub fn finish(&self, message: &'static str) {
        if let Some(ref pb) = self.progress {
            pb.finish_with_message(message);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
