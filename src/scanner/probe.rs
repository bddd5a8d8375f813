//! HTTP probe client.
//!
//! Fetches a page from a raw address with retries and linear backoff,
//! presenting a browser-like header set and an explicit virtual host so
//! name-based servers route the request to the site being looked for.
//!
//! # Behaviour
//!
//! - **Retries**: up to `max_retries + 1` attempts, attempt `k` preceded by
//!   a sleep of `k × 500ms`
//! - **Deadline**: each attempt is bounded on its own, body included
//! - **Success**: any HTTP status; the body is capped at 1 MiB
//! - **TLS**: certificates are not validated, targets are bare addresses

use crate::config::ScanSettings;
use crate::error::{ProbeError, ResolveError};
use crate::scanner::dns::{NameserverResolver, ReverseDns};
use crate::scanner::title::extract_title;
use crate::scanner::traits::{ProbeResult, Prober};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect, Client, Proxy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Maximum response body kept per request.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Base delay between attempts; attempt `k` waits `k` times this.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Per-attempt deadline used when resolving the searched domain's title.
pub const DOMAIN_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_REDIRECTS: usize = 10;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.67",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Mobile/15E148 Safari/604.1",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.8,de;q=0.6",
    "en-US,en;q=0.9,fr;q=0.7",
];

/// A raw response from one fetch.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
    pub elapsed_ms: u64,
}

/// Why a single attempt was abandoned.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

/// What to do with a response that carries no `<title>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingTitle {
    /// Drop the response.
    Discard,
    /// Use the given string as the title.
    Fallback(String),
}

/// One URL to try, and the `Host` header to send with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeUrl {
    pub url: String,
    pub virtual_host: Option<String>,
}

/// An ordered fallback chain plus a missing-title policy.
///
/// URLs are tried in order; the first one that yields any response ends the
/// chain, and the policy decides what happens if that response has no title.
#[derive(Debug, Clone)]
pub struct ProbePlan {
    pub urls: Vec<ProbeUrl>,
    pub timeout: Duration,
    pub missing_title: MissingTitle,
}

impl ProbePlan {
    /// HTTPS then HTTP against an address, optionally for a named virtual host.
    pub fn for_ip(ip: &str, virtual_host: Option<&str>, timeout: Duration) -> Self {
        let virtual_host = virtual_host.filter(|h| !h.is_empty()).map(str::to_string);
        Self {
            urls: ["https", "http"]
                .iter()
                .map(|scheme| ProbeUrl {
                    url: format!("{}://{}", scheme, ip),
                    virtual_host: virtual_host.clone(),
                })
                .collect(),
            timeout,
            missing_title: MissingTitle::Discard,
        }
    }

    /// HTTPS, HTTP, then both again with a `www.` prefix, against a domain.
    ///
    /// A response without a title falls back to the domain itself.
    pub fn for_domain(domain: &str, timeout: Duration) -> Self {
        let www = format!("www.{}", domain);
        let urls = [
            ("https", domain),
            ("http", domain),
            ("https", www.as_str()),
            ("http", www.as_str()),
        ]
        .iter()
        .map(|(scheme, host)| ProbeUrl {
            url: format!("{}://{}", scheme, host),
            virtual_host: None,
        })
        .collect();

        Self {
            urls,
            timeout,
            missing_title: MissingTitle::Fallback(domain.to_string()),
        }
    }
}

/// A response together with the title chosen for it.
#[derive(Debug, Clone)]
pub struct TitledResponse {
    pub response: HttpResponse,
    pub title: String,
}

/// Title of the searched domain and how long it took to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTitle {
    pub title: String,
    pub elapsed_ms: u64,
}

/// Retrying HTTP client shared by every worker of a scan.
#[derive(Clone)]
pub struct ProbeClient {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
    reverse_dns: Option<ReverseDns>,
}

impl ProbeClient {
    /// Build a client from scan settings (proxy, nameservers, retries).
    pub fn new(settings: &ScanSettings) -> Result<Self, ProbeError> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .tcp_nodelay(true);

        if let Some(ref proxy) = settings.proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|e| ProbeError::InvalidProxy {
                url: proxy.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        if !settings.dns_servers.is_empty() {
            builder = builder.dns_resolver(Arc::new(NameserverResolver::new(
                &settings.dns_servers,
            )?));
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::ClientBuild(e.to_string()))?;

        let reverse_dns = if settings.reverse_dns {
            Some(ReverseDns::new(&settings.dns_servers)?)
        } else {
            None
        };

        Ok(Self {
            client,
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff,
            reverse_dns,
        })
    }

    /// Retries used by the probe chains.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fetch `url`, retrying transport failures and timeouts.
    ///
    /// Returns `None` once every attempt has failed; failures are only logged.
    pub async fn fetch(
        &self,
        url: &str,
        virtual_host: Option<&str>,
        deadline: Duration,
        max_retries: u32,
    ) -> Option<HttpResponse> {
        let mut last_err = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                debug!("Retry attempt {}/{} for {}", attempt, max_retries, url);
                sleep(self.retry_backoff * attempt).await;
            }

            match self.attempt(url, virtual_host, deadline).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!("Request succeeded on retry {} for {}", attempt, url);
                    }
                    return Some(response);
                }
                Err(e) => {
                    debug!("Request error for {} (attempt {}): {}", url, attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }

        if let Some(e) = last_err {
            debug!("Connection failed for {}: {}", url, e);
        }
        None
    }

    async fn attempt(
        &self,
        url: &str,
        virtual_host: Option<&str>,
        deadline: Duration,
    ) -> Result<HttpResponse, AttemptError> {
        let start = Instant::now();

        let mut request = self.client.get(url).headers(browser_headers());
        if let Some(host) = virtual_host {
            request = request.header(header::HOST, host);
        }

        let exchange = async move {
            let mut response = request.send().await?;
            let status = response.status().as_u16();
            let body = read_capped(&mut response, MAX_BODY_SIZE).await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = timeout(deadline, exchange)
            .await
            .map_err(|_| AttemptError::Timeout(deadline))??;

        Ok(HttpResponse {
            status,
            url: url.to_string(),
            body,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Walk a probe plan and apply its missing-title policy.
    pub async fn probe(&self, plan: &ProbePlan) -> Option<TitledResponse> {
        let mut response = None;
        for (i, candidate) in plan.urls.iter().enumerate() {
            if i > 0 {
                debug!("Falling back to {}", candidate.url);
            }
            response = self
                .fetch(
                    &candidate.url,
                    candidate.virtual_host.as_deref(),
                    plan.timeout,
                    self.max_retries,
                )
                .await;
            if response.is_some() {
                break;
            }
        }
        let response = response?;

        let title = match (extract_title(&response.body), &plan.missing_title) {
            (Some(title), _) => title,
            (None, MissingTitle::Fallback(fallback)) => {
                debug!("No <title> in {}, using {}", response.url, fallback);
                fallback.clone()
            }
            (None, MissingTitle::Discard) => return None,
        };

        Some(TitledResponse { response, title })
    }

    /// Probe one address for a titled page, enriched with its reverse DNS name.
    pub async fn probe_ip(
        &self,
        ip: &str,
        virtual_host: Option<&str>,
        deadline: Duration,
    ) -> Option<ProbeResult> {
        debug!("Scanning IP: {}", ip);
        let plan = ProbePlan::for_ip(ip, virtual_host, deadline);
        let TitledResponse { response, title } = self.probe(&plan).await?;

        debug!("Site found on {}: {} (Status: {})", ip, title, response.status);

        let hostname = match self.reverse_dns {
            Some(ref rdns) => rdns.lookup(ip).await,
            None => None,
        };

        Some(
            ProbeResult::new(response.status, ip, title, response.elapsed_ms)
                .with_hostname(hostname),
        )
    }

    /// Fetch the searched domain's own title, used as the match key.
    pub async fn resolve_domain_title(&self, domain: &str) -> Result<DomainTitle, ResolveError> {
        self.resolve_domain_title_within(domain, DOMAIN_RESOLVE_TIMEOUT)
            .await
    }

    /// [`Self::resolve_domain_title`] with an explicit per-attempt deadline.
    pub async fn resolve_domain_title_within(
        &self,
        domain: &str,
        deadline: Duration,
    ) -> Result<DomainTitle, ResolveError> {
        let plan = ProbePlan::for_domain(domain, deadline);
        let titled = self
            .probe(&plan)
            .await
            .ok_or_else(|| ResolveError::DomainUnreachable(domain.to_string()))?;

        debug!(
            "Response received: Status={}, Time={}ms",
            titled.response.status, titled.response.elapsed_ms
        );

        Ok(DomainTitle {
            title: titled.title,
            elapsed_ms: titled.response.elapsed_ms,
        })
    }

    /// Bind this client to a virtual host and timeout, for use by the dispatcher.
    pub fn into_prober(self, virtual_host: Option<String>, deadline: Duration) -> SiteProber {
        SiteProber {
            client: self,
            virtual_host,
            timeout: deadline,
        }
    }
}

/// Probes targets as candidate hosts for one virtual host.
#[derive(Clone)]
pub struct SiteProber {
    client: ProbeClient,
    virtual_host: Option<String>,
    timeout: Duration,
}

#[async_trait]
impl Prober for SiteProber {
    async fn probe(&self, target: &str) -> Option<ProbeResult> {
        self.client
            .probe_ip(target, self.virtual_host.as_deref(), self.timeout)
            .await
    }
}

/// Read at most `cap` bytes of the body, dropping the rest.
async fn read_capped(response: &mut reqwest::Response, cap: usize) -> reqwest::Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = cap - buf.len();
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buf.len() >= cap {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// A randomized, realistic browser header set.
fn browser_headers() -> HeaderMap {
    let mut rng = rand::thread_rng();
    let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    let language = ACCEPT_LANGUAGES
        .choose(&mut rng)
        .copied()
        .unwrap_or(ACCEPT_LANGUAGES[0]);

    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(language));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header as header_eq, method};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn test_client(max_retries: u32, backoff: Duration) -> ProbeClient {
        let settings = ScanSettings::default()
            .with_max_retries(max_retries)
            .with_retry_backoff(backoff)
            .with_reverse_dns(false);
        ProbeClient::new(&settings).unwrap()
    }

    /// Stalls the first `slow` requests past the client deadline.
    struct SlowThenFast {
        calls: Arc<AtomicUsize>,
        slow: usize,
    }

    impl Respond for SlowThenFast {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.slow {
                ResponseTemplate::new(200).set_delay(Duration::from_secs(2))
            } else {
                ResponseTemplate::new(200).set_body_string("<title>Recovered</title>")
            }
        }
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_ip_plan_order() {
        let plan = ProbePlan::for_ip("10.0.0.1", Some("example.com"), Duration::from_secs(1));
        let urls: Vec<_> = plan.urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(urls, vec!["https://10.0.0.1", "http://10.0.0.1"]);
        assert!(plan
            .urls
            .iter()
            .all(|u| u.virtual_host.as_deref() == Some("example.com")));
        assert_eq!(plan.missing_title, MissingTitle::Discard);

        let plan = ProbePlan::for_ip("10.0.0.1", Some(""), Duration::from_secs(1));
        assert!(plan.urls.iter().all(|u| u.virtual_host.is_none()));
    }

    #[test]
    fn test_domain_plan_order() {
        let plan = ProbePlan::for_domain("example.com", DOMAIN_RESOLVE_TIMEOUT);
        let urls: Vec<_> = plan.urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com",
                "http://example.com",
                "https://www.example.com",
                "http://www.example.com",
            ]
        );
        assert_eq!(
            plan.missing_title,
            MissingTitle::Fallback("example.com".to_string())
        );
    }

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers();
        let ua = headers.get(header::USER_AGENT).unwrap().to_str().unwrap();
        assert!(USER_AGENTS.contains(&ua));
        assert!(headers.contains_key("sec-fetch-mode"));
        assert!(headers.contains_key(header::ACCEPT_LANGUAGE));
    }

    #[tokio::test]
    async fn test_any_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let response = client
            .fetch(&server.uri(), None, Duration::from_secs(2), 0)
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "not here");
    }

    #[tokio::test]
    async fn test_virtual_host_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_eq("host", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("vhost"))
            .mount(&server)
            .await;

        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let response = client
            .fetch(&server.uri(), Some("example.com"), Duration::from_secs(2), 0)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "vhost");
    }

    #[tokio::test]
    async fn test_retry_after_timeouts_with_backoff() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .respond_with(SlowThenFast {
                calls: Arc::clone(&calls),
                slow: 2,
            })
            .mount(&server)
            .await;

        let client = test_client(3, DEFAULT_RETRY_BACKOFF);
        let start = Instant::now();
        let response = client
            .fetch(&server.uri(), None, Duration::from_millis(200), 3)
            .await;

        assert!(response.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Backoff of 1×500ms + 2×500ms, plus two 200ms deadlines.
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_gives_up_after_all_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(2, Duration::from_millis(10));
        let response = client
            .fetch(&server.uri(), None, Duration::from_millis(100), 2)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_none() {
        let client = test_client(1, Duration::from_millis(10));
        let url = format!("http://127.0.0.1:{}", closed_port());
        assert!(client
            .fetch(&url, None, Duration::from_secs(1), 1)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(2 * MAX_BODY_SIZE)))
            .mount(&server)
            .await;

        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let response = client
            .fetch(&server.uri(), None, Duration::from_secs(5), 0)
            .await
            .unwrap();
        assert_eq!(response.body.len(), MAX_BODY_SIZE);
    }

    #[tokio::test]
    async fn test_probe_ip_falls_back_to_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><TITLE>\nExample Domain\n</TITLE></html>"),
            )
            .mount(&server)
            .await;

        let target = server.address().to_string();
        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let result = client
            .probe_ip(&target, Some("example.com"), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(result.status_code, 200);
        assert_eq!(result.ip, target);
        assert_eq!(result.title, "Example Domain");
        assert_eq!(result.hostname, None);
    }

    #[tokio::test]
    async fn test_probe_ip_discards_untitled_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let target = server.address().to_string();
        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        assert!(client
            .probe_ip(&target, None, Duration::from_secs(2))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_domain_title_falls_back_to_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Access denied"))
            .mount(&server)
            .await;

        let domain = server.address().to_string();
        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let resolved = client
            .resolve_domain_title_within(&domain, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(resolved.title, domain);
    }

    #[tokio::test]
    async fn test_domain_title_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Example</title>"))
            .mount(&server)
            .await;

        let domain = server.address().to_string();
        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let resolved = client
            .resolve_domain_title_within(&domain, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(resolved.title, "Example");
    }

    #[tokio::test]
    async fn test_unreachable_domain_is_an_error() {
        let domain = format!("127.0.0.1:{}", closed_port());
        let client = test_client(0, DEFAULT_RETRY_BACKOFF);
        let err = client
            .resolve_domain_title_within(&domain, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::DomainUnreachable(_)));
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let settings = ScanSettings::default().with_proxy(Some("not a url".to_string()));
        assert!(matches!(
            ProbeClient::new(&settings),
            Err(ProbeError::InvalidProxy { .. })
        ));
    }
}
