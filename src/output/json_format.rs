//! JSON output formatting.

use super::Report;
use crate::error::ReportResult;

/// Render a report as pretty-printed JSON.
pub fn render_json(report: &Report) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
