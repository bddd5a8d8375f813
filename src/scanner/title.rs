//! Page title extraction.

use regex::Regex;
use std::sync::LazyLock;

/// `<title>` contents, case-insensitive, allowed to span lines.
static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));

/// Extract the first `<title>` from an HTML body.
///
/// Surrounding whitespace is trimmed. An empty `<title></title>` still counts
/// as a title (the empty string); only a missing tag yields `None`.
pub fn extract_title(body: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
