//! CSV output formatting.

use super::Report;
use crate::error::{ReportError, ReportResult};

/// Render the results of a report as CSV, one row per responsive address.
pub fn render_csv(report: &Report) -> ReportResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    wtr.write_record(["status_code", "ip", "title", "hostname", "elapsed_ms"])?;

    for result in &report.results {
        wtr.write_record([
            result.status_code.to_string().as_str(),
            result.ip.as_str(),
            result.title.as_str(),
            result.hostname.as_deref().unwrap_or(""),
            result.elapsed_ms.to_string().as_str(),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ReportError::Render(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Render(e.to_string()))
}
