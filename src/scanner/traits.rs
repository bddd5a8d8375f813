//! Prober trait abstraction.
//!
//! Defines the probe outcome type and a common interface for probing one
//! target, so the dispatcher can be driven by the HTTP client or by a test
//! double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A responsive target with a page title.
///
/// Created only when a fetch produced a response; any HTTP status counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// HTTP status code of the response.
    pub status_code: u16,
    /// The probed address.
    pub ip: String,
    /// Extracted page title.
    pub title: String,
    /// Reverse DNS name, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Time from request to end of body, in milliseconds.
    pub elapsed_ms: u64,
}

impl ProbeResult {
    /// Create a new probe result.
    pub fn new(
        status_code: u16,
        ip: impl Into<String>,
        title: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            status_code,
            ip: ip.into(),
            title: title.into(),
            hostname: None,
            elapsed_ms,
        }
    }

    /// Set the reverse DNS hostname.
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    /// Whether this result's title equals `title`.
    pub fn matches_title(&self, title: &str) -> bool {
        !title.is_empty() && self.title == title
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.status_code, self.ip, self.title)?;
        if let Some(ref hostname) = self.hostname {
            write!(f, " [{}]", hostname)?;
        }
        Ok(())
    }
}

/// Trait for probing a single target.
///
/// Implementations swallow transient failures: `None` means "no usable
/// response", never "abort the scan".
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one target address.
    async fn probe(&self, target: &str) -> Option<ProbeResult>;
}

/// A shared prober for dynamic dispatch.
pub type SharedProber = std::sync::Arc<dyn Prober>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_result_display() {
        let result = ProbeResult::new(200, "1.1.1.1", "Example", 42);
        assert_eq!(result.to_string(), "200, 1.1.1.1, Example");

        let result = result.with_hostname(Some("one.one.one.one".to_string()));
        assert_eq!(result.to_string(), "200, 1.1.1.1, Example [one.one.one.one]");
    }

    #[test]
    fn test_matches_title() {
        let result = ProbeResult::new(200, "1.1.1.1", "Example", 42);
        assert!(result.matches_title("Example"));
        assert!(!result.matches_title("Other"));
        assert!(!result.matches_title(""));
    }

    #[test]
    fn test_hostname_skipped_when_absent() {
        let result = ProbeResult::new(301, "10.0.0.1", "Moved", 7);
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("hostname"));
        let parsed: ProbeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
