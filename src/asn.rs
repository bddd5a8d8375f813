//! ASN to IP block lookup.
//!
//! Route objects are read from the RADb whois web interface: every
//! `route: <cidr>` line originated by the ASN becomes one block.

use crate::error::ResolveError;
use crate::scanner::ProbeClient;
use crate::types::{parse_block, Asn};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// RADb query endpoint.
pub const RADB_QUERY_URL: &str = "https://www.radb.net/query";

/// Deadline for each lookup attempt.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

static ROUTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)route:\s+([0-9./]+)").expect("static regex"));

/// Extract IPv4 route blocks from a RADb response, first occurrence first.
pub fn extract_routes(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ROUTE_PATTERN
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|route| seen.insert(route.clone()))
        .collect()
}

/// Keep the routes that can be scanned, skipping malformed or oversized ones.
pub fn scannable_routes(routes: Vec<String>) -> Vec<String> {
    routes
        .into_iter()
        .filter(|route| match parse_block(route) {
            Ok(_) => true,
            Err(e) => {
                warn!("Skipping route {}: {}", route, e);
                false
            }
        })
        .collect()
}

/// Query URL listing the routes originated by `asn`.
pub fn query_url(base: &str, asn: &Asn) -> String {
    format!(
        "{}?advanced_query=1&keywords={}&-T+option=&ip_option=&-i=1&-i+option=origin",
        base, asn
    )
}

/// Look up the IP blocks announced by `asn`.
pub async fn fetch_routes(client: &ProbeClient, asn: &Asn) -> Result<Vec<String>, ResolveError> {
    fetch_routes_from(client, RADB_QUERY_URL, asn).await
}

/// [`fetch_routes`] against another RADb-compatible endpoint.
pub async fn fetch_routes_from(
    client: &ProbeClient,
    base: &str,
    asn: &Asn,
) -> Result<Vec<String>, ResolveError> {
    let url = query_url(base, asn);
    debug!("Fetching routes for {} from {}", asn, url);

    let response = client
        .fetch(&url, None, LOOKUP_TIMEOUT, client.max_retries())
        .await
        .ok_or_else(|| ResolveError::AsnLookupFailed(asn.to_string()))?;

    let routes = scannable_routes(extract_routes(&response.body));
    if routes.is_empty() {
        return Err(ResolveError::NoRoutes(asn.to_string()));
    }

    info!("{} announces {} IP blocks", asn, routes.len());
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanSettings;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RADB_BODY: &str = "\
route:          192.0.2.0/24
descr:          Example
origin:         AS64500
route6:         2001:db8::/32
route:          198.51.100.0/24
route:          192.0.2.0/24
";

    fn client() -> ProbeClient {
        let settings = ScanSettings::default()
            .with_max_retries(0)
            .with_reverse_dns(false);
        ProbeClient::new(&settings).unwrap()
    }

    #[test]
    fn test_extract_routes_dedups_in_order() {
        assert_eq!(
            extract_routes(RADB_BODY),
            vec!["192.0.2.0/24".to_string(), "198.51.100.0/24".to_string()]
        );
    }

    #[test]
    fn test_extract_routes_from_html() {
        let body = "<pre>route:      203.0.113.0/24<br>\nroute: 203.0.113.128/25</pre>";
        assert_eq!(
            extract_routes(body),
            vec!["203.0.113.0/24".to_string(), "203.0.113.128/25".to_string()]
        );
        assert!(extract_routes("no routes here").is_empty());
    }

    #[test]
    fn test_oversized_routes_are_skipped() {
        let routes = vec![
            "10.0.0.0/8".to_string(),
            "192.0.2.0/24".to_string(),
            "192.0.2.0/40".to_string(),
        ];
        assert_eq!(scannable_routes(routes), vec!["192.0.2.0/24".to_string()]);
    }

    #[test]
    fn test_query_url() {
        let asn = Asn::parse("as64500").unwrap();
        assert_eq!(
            query_url(RADB_QUERY_URL, &asn),
            "https://www.radb.net/query?advanced_query=1&keywords=AS64500&-T+option=&ip_option=&-i=1&-i+option=origin"
        );
    }

    #[tokio::test]
    async fn test_fetch_routes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("keywords", "AS64500"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RADB_BODY))
            .mount(&server)
            .await;

        let base = format!("{}/query", server.uri());
        let asn = Asn::parse("AS64500").unwrap();
        let routes = fetch_routes_from(&client(), &base, &asn).await.unwrap();
        assert_eq!(routes.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_routes_without_routes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("% No entries found"))
            .mount(&server)
            .await;

        let base = format!("{}/query", server.uri());
        let asn = Asn::parse("AS64500").unwrap();
        let err = fetch_routes_from(&client(), &base, &asn).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoRoutes(_)));
    }

    #[tokio::test]
    async fn test_fetch_routes_with_only_oversized_routes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("route: 10.0.0.0/8\n"))
            .mount(&server)
            .await;

        let base = format!("{}/query", server.uri());
        let asn = Asn::parse("AS64500").unwrap();
        let err = fetch_routes_from(&client(), &base, &asn).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoRoutes(_)));
    }

    #[tokio::test]
    async fn test_fetch_routes_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let base = format!("http://127.0.0.1:{}/query", port);
        let asn = Asn::parse("AS64500").unwrap();
        let err = fetch_routes_from(&client(), &base, &asn).await.unwrap_err();
        assert!(matches!(err, ResolveError::AsnLookupFailed(_)));
    }
}
