//! Input validation for scan parameters.

use super::TargetError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ASN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Aa][Ss]\d{1,10}$").expect("static regex"));

/// Bounds applied to the worker count.
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 1000;

/// Bounds applied to a per-request timeout, in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 100;
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// A validated autonomous system number, normalized to upper case (`AS13335`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asn(String);

impl Asn {
    /// Parse and normalize an ASN string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        if !ASN_PATTERN.is_match(s) {
            return Err(TargetError::InvalidAsn(s.to_string()));
        }
        Ok(Self(s.to_uppercase()))
    }

    /// The normalized ASN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Asn {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip scheme, path and port from a user-supplied domain.
pub fn normalize_domain(domain: &str) -> &str {
    let domain = domain.trim();
    let domain = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain);
    let domain = domain.split('/').next().unwrap_or(domain);
    match domain.rfind(':') {
        Some(idx) => &domain[..idx],
        None => domain,
    }
}

/// Validate a domain name and return its normalized host part.
pub fn validate_domain(domain: &str) -> Result<String, TargetError> {
    let host = normalize_domain(domain);
    let invalid = || TargetError::InvalidDomain(domain.to_string());

    if host.is_empty() || host.len() > 253 {
        return Err(invalid());
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }

    for label in labels {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid());
        }
        let first = label.chars().next().is_some_and(char::is_alphanumeric);
        let last = label.chars().last().is_some_and(char::is_alphanumeric);
        if !first || !last {
            return Err(invalid());
        }
    }

    Ok(host.to_string())
}

/// Clamp a worker count into the supported range.
pub fn clamp_workers(workers: usize) -> usize {
    workers.clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Clamp a per-request timeout into the supported range.
pub fn clamp_timeout(timeout_ms: u64) -> u64 {
    timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
}

/// Make a string safe to embed in a file name.
///
/// Path separators, dots and other reserved characters become `_`;
/// whitespace and control characters are dropped.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => Some('_'),
            c if c.is_control() || c.is_whitespace() => None,
            c => Some(c),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asn_parsing() {
        assert_eq!(Asn::parse("AS13335").unwrap().as_str(), "AS13335");
        assert_eq!(Asn::parse("as13335").unwrap().as_str(), "AS13335");
        assert!(Asn::parse("AS1").is_ok());
        assert!(Asn::parse("13335").is_err());
        assert!(Asn::parse("ASABC").is_err());
        assert!(Asn::parse("").is_err());
        assert!(Asn::parse("AS12345678901").is_err());
    }

    #[test]
    fn test_validate_domain() {
        assert_eq!(validate_domain("example.com").unwrap(), "example.com");
        assert_eq!(validate_domain("sub.example.com").unwrap(), "sub.example.com");
        assert_eq!(validate_domain("https://example.com").unwrap(), "example.com");
        assert_eq!(validate_domain("example.com/path").unwrap(), "example.com");
        assert_eq!(validate_domain("example.com:8443").unwrap(), "example.com");
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("-bad.example.com").is_err());
        assert!(validate_domain(&format!("{}.com", "a".repeat(255))).is_err());
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_workers(0), 1);
        assert_eq!(clamp_workers(100), 100);
        assert_eq!(clamp_workers(5000), 1000);
        assert_eq!(clamp_timeout(10), 100);
        assert_eq!(clamp_timeout(300), 300);
        assert_eq!(clamp_timeout(120_000), 60_000);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("example.com"), "example_com");
        assert_eq!(sanitize_filename("sub.domain.com:8080"), "sub_domain_com_8080");
        assert_eq!(sanitize_filename("a/b\\c d"), "a_b_cd");
    }
}
