//! Ctrl-C / SIGTERM handling.
//!
//! The first signal during a scan cancels it: the dispatcher stops
//! scheduling, drains what is in flight, and the caller offers to export the
//! partial results. Any further signal, or a signal once the scan is over,
//! exits the process immediately.

use crate::error::ReportResult;
use crate::output::{self, print_info, print_success, print_warning, OutputFormat, Report};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status used when a second signal forces the process down.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Background signal listener bound to one scan's cancellation token.
///
/// The listener task is aborted when this value is dropped.
pub struct InterruptListener {
    cancel: CancellationToken,
    scanning: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl InterruptListener {
    /// Start listening. Must be called from within a tokio runtime.
    pub fn spawn(cancel: CancellationToken) -> Self {
        let scanning = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(listen(cancel.clone(), Arc::clone(&scanning)));
        Self {
            cancel,
            scanning,
            handle,
        }
    }

    /// The token cancelled by the first signal.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether a signal has cancelled the scan.
    pub fn interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Mark the scan as over; from now on a signal exits right away.
    pub fn scan_finished(&self) {
        self.scanning.store(false, Ordering::Release);
    }
}

impl Drop for InterruptListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn listen(cancel: CancellationToken, scanning: Arc<AtomicBool>) {
    let mut signals = Signals::new();

    while let Some(name) = signals.recv().await {
        if scanning.load(Ordering::Acquire) && !cancel.is_cancelled() {
            info!("Received {}, cancelling scan", name);
            eprintln!();
            print_warning("Scan interrupted by user, waiting for in-flight probes (press Ctrl+C again to quit)");
            cancel.cancel();
            continue;
        }

        eprintln!();
        print_warning(&format!("Received {} again, exiting", name));
        std::process::exit(EXIT_INTERRUPTED);
    }
}

/// Ctrl-C plus, on unix, SIGTERM.
struct Signals {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl Signals {
    fn new() -> Self {
        Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(|e| warn!("Could not listen for SIGTERM: {}", e))
                .ok(),
        }
    }

    /// Wait for the next signal. `None` once no signal can be received.
    async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        if let Some(ref mut terminate) = self.terminate {
            return tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => Some("SIGINT"),
                    Err(e) => {
                        warn!("Could not listen for Ctrl-C: {}", e);
                        None
                    }
                },
                sig = terminate.recv() => sig.map(|_| "SIGTERM"),
            };
        }

        match tokio::signal::ctrl_c().await {
            Ok(()) => Some("SIGINT"),
            Err(e) => {
                warn!("Could not listen for Ctrl-C: {}", e);
                None
            }
        }
    }
}

/// Offer the results collected before an interrupt for export.
///
/// With `export` set the file is written without asking. Returns the export
/// path, or `None` when nothing was written.
pub fn handle_interrupt(
    report: &Report,
    format: OutputFormat,
    export: bool,
    dir: &Path,
) -> ReportResult<Option<PathBuf>> {
    if report.results.is_empty() {
        print_warning("No results to export");
        return Ok(None);
    }

    print_info(&format!(
        "Found {} websites before interruption",
        report.results.len()
    ));

    if !export && !output::confirm_export() {
        print_info("Export canceled");
        return Ok(None);
    }

    output::print_report(report, format)?;
    let path = output::export_report(report, format, dir)?;
    print_success(&format!("Results exported to {}", path.display()));
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::METHOD_INTERRUPTED;
    use crate::scanner::ProbeResult;
    use tempfile::TempDir;

    #[test]
    fn test_nothing_to_export() {
        let dir = TempDir::new().unwrap();
        let report = Report::new(METHOD_INTERRUPTED, 500, vec![], vec![]);

        let exported = handle_interrupt(&report, OutputFormat::Text, true, dir.path()).unwrap();
        assert!(exported.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_forced_export_of_partial_results() {
        let dir = TempDir::new().unwrap();
        let report = Report::new(
            METHOD_INTERRUPTED,
            500,
            vec!["192.0.2.0/24".to_string()],
            vec![ProbeResult::new(200, "192.0.2.7", "Example", 40)],
        )
        .with_search(Some("example.com"), Some("Example"));

        let path = handle_interrupt(&report, OutputFormat::Json, true, dir.path())
            .unwrap()
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("Search Interrupted"));
        assert!(written.contains("192.0.2.7"));
    }

    #[tokio::test]
    async fn test_listener_state() {
        let listener = InterruptListener::spawn(CancellationToken::new());
        assert!(!listener.interrupted());

        listener.token().cancel();
        assert!(listener.interrupted());
        listener.scan_finished();
    }
}
