//! Plain text output formatting.
//!
//! Produces the text report and the styled console messages.

use super::Report;
use chrono::{DateTime, Local, TimeDelta};
use console::style;

const RULE_TITLE: &str = "==================== RESULT ====================";
const RULE: &str = "================================================";

/// Render a report as plain text.
///
/// The text is kept unstyled so the same string can be exported.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(RULE_TITLE);
    out.push_str(&format!("\nMethod:        {}", report.method));
    if let Some(ref site) = report.search_site {
        out.push_str(&format!("\nSearch Site:   {}", site));
    }
    out.push_str(&format!("\nTimeout:       {}ms", report.timeout_ms));
    out.push_str(&format!("\nIP Blocks:     {}", report.ip_blocks.join(",")));
    out.push_str("\nFound Websites:\n");
    for result in &report.results {
        out.push_str(&result.to_string());
        out.push('\n');
    }
    out.push_str(RULE);

    out
}

/// What is about to be scanned.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub asn: Option<String>,
    pub blocks: usize,
    pub addresses: usize,
    pub timeout_ms: u64,
    pub workers: usize,
}

impl ScanSummary {
    /// Worst-case finish time: every wave of `workers` probes hits the timeout.
    pub fn estimated_end(&self, start: DateTime<Local>) -> DateTime<Local> {
        let workers = self.workers.max(1) as u64;
        let waves = (self.addresses as u64).div_ceil(workers);
        let millis = i64::try_from(waves.saturating_mul(self.timeout_ms)).unwrap_or(i64::MAX);
        TimeDelta::try_milliseconds(millis)
            .and_then(|delta| start.checked_add_signed(delta))
            .unwrap_or(start)
    }
}

/// Print the pre-scan summary.
pub fn print_scan_header(summary: &ScanSummary) {
    let start = Local::now();
    let end = summary.estimated_end(start);

    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("ipsift").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    if let Some(ref asn) = summary.asn {
        println!("{} ASN:         {}", style("•").dim(), style(asn).yellow());
    }
    println!(
        "{} IP Block:    {}",
        style("•").dim(),
        style(summary.blocks).white().bold()
    );
    println!(
        "{} IP Address:  {}",
        style("•").dim(),
        style(summary.addresses).white().bold()
    );
    println!(
        "{} Start Time:  {}",
        style("•").dim(),
        start.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "{} End Time:    {}",
        style("•").dim(),
        end.format("%Y-%m-%d %H:%M:%S")
    );
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{}", success_line(msg));
}

/// A success message with its marker, for callers that print it themselves.
pub fn success_line(msg: &str) -> String {
    format!("{} {}", style("✓").green().bold(), msg)
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{METHOD_ALL, METHOD_MATCH};
    use crate::scanner::ProbeResult;

    #[test]
    fn test_text_report_layout() {
        let report = Report::new(
            METHOD_MATCH,
            1150,
            vec!["192.0.2.0/30".to_string(), "198.51.100.0/31".to_string()],
            vec![ProbeResult::new(200, "192.0.2.1", "Example Domain", 5)
                .with_hostname(Some("web.example.com".to_string()))],
        )
        .with_search(Some("example.com"), Some("Example Domain"));

        let text = render_text(&report);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], RULE_TITLE);
        assert_eq!(lines[1], "Method:        Search Domain by ASN");
        assert_eq!(lines[2], "Search Site:   Example Domain");
        assert_eq!(lines[3], "Timeout:       1150ms");
        assert_eq!(lines[4], "IP Blocks:     192.0.2.0/30,198.51.100.0/31");
        assert_eq!(lines[5], "Found Websites:");
        assert_eq!(lines[6], "200, 192.0.2.1, Example Domain [web.example.com]");
        assert_eq!(lines[7], RULE);
    }

    #[test]
    fn test_text_report_without_search_site() {
        let report = Report::new(METHOD_ALL, 300, vec![], vec![]);
        let text = render_text(&report);
        assert!(!text.contains("Search Site"));
        assert!(text.contains("Found Websites:\n="));
    }

    #[test]
    fn test_estimated_end() {
        let start = Local::now();
        let summary = ScanSummary {
            asn: None,
            blocks: 1,
            addresses: 254,
            timeout_ms: 1000,
            workers: 100,
        };
        // Three waves of at most 100 probes.
        assert_eq!(summary.estimated_end(start) - start, TimeDelta::seconds(3));

        let empty = ScanSummary {
            addresses: 0,
            ..summary
        };
        assert_eq!(empty.estimated_end(start), start);
    }
}
