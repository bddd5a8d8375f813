//! DNS helpers for probing.
//!
//! Two concerns live here:
//! - reverse lookups used to enrich probe results with a hostname
//! - a resolver backed by user-chosen nameservers, plugged into the HTTP client

use crate::error::ProbeError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

/// Upper bound for a single reverse lookup.
pub const REVERSE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a resolver, using `servers` when given and the system configuration otherwise.
pub fn build_resolver(servers: &[String]) -> Result<TokioAsyncResolver, ProbeError> {
    let (config, opts) = resolver_config(servers)?;
    Ok(TokioAsyncResolver::tokio(config, opts))
}

fn resolver_config(servers: &[String]) -> Result<(ResolverConfig, ResolverOpts), ProbeError> {
    let ips = parse_servers(servers)?;
    let (config, mut opts) = if ips.is_empty() {
        read_system_conf().unwrap_or_else(|e| {
            warn!("Could not read system DNS configuration ({}), using defaults", e);
            (ResolverConfig::default(), ResolverOpts::default())
        })
    } else {
        let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
        (
            ResolverConfig::from_parts(None, vec![], group),
            ResolverOpts::default(),
        )
    };
    opts.timeout = REVERSE_LOOKUP_TIMEOUT;
    opts.attempts = 1;
    Ok((config, opts))
}

/// Parse nameserver addresses, ignoring blanks.
pub fn parse_servers(servers: &[String]) -> Result<Vec<IpAddr>, ProbeError> {
    servers
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|_| ProbeError::InvalidDnsServer(s.to_string()))
        })
        .collect()
}

/// Reverse DNS enrichment. Failures are never fatal.
#[derive(Clone)]
pub struct ReverseDns {
    resolver: Arc<TokioAsyncResolver>,
}

impl ReverseDns {
    /// Create a reverse resolver over the given nameservers (system configuration if empty).
    pub fn new(servers: &[String]) -> Result<Self, ProbeError> {
        Ok(Self {
            resolver: Arc::new(build_resolver(servers)?),
        })
    }

    /// Look up the PTR name of `ip`.
    ///
    /// Returns `None` when `ip` is not an address, nothing is found, or the
    /// lookup takes longer than [`REVERSE_LOOKUP_TIMEOUT`].
    pub async fn lookup(&self, ip: &str) -> Option<String> {
        let addr: IpAddr = ip.parse().ok()?;
        debug!("Reverse DNS lookup for {}", addr);

        match timeout(REVERSE_LOOKUP_TIMEOUT, self.resolver.reverse_lookup(addr)).await {
            Ok(Ok(names)) => {
                let name = names
                    .iter()
                    .map(|n| n.to_string().trim_end_matches('.').to_string())
                    .find(|n| !n.is_empty());
                if let Some(ref name) = name {
                    debug!("Reverse DNS found for {}: {}", addr, name);
                }
                name
            }
            Ok(Err(e)) => {
                debug!("Reverse DNS lookup failed for {}: {}", addr, e);
                None
            }
            Err(_) => {
                debug!("Reverse DNS lookup timed out for {}", addr);
                None
            }
        }
    }
}

/// Resolver handed to `reqwest` when custom nameservers are configured.
pub struct NameserverResolver {
    resolver: Arc<TokioAsyncResolver>,
}

impl NameserverResolver {
    pub fn new(servers: &[String]) -> Result<Self, ProbeError> {
        Ok(Self {
            resolver: Arc::new(build_resolver(servers)?),
        })
    }
}

impl reqwest::dns::Resolve for NameserverResolver {
    fn resolve(&self, name: reqwest::dns::Name) -> reqwest::dns::Resolving {
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let lookup = resolver.lookup_ip(name.as_str()).await?;
            let addrs: reqwest::dns::Addrs =
                Box::new(lookup.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_servers() {
        let servers = vec!["8.8.8.8".to_string(), " 1.1.1.1 ".to_string(), "".to_string()];
        let ips = parse_servers(&servers).unwrap();
        assert_eq!(ips.len(), 2);
        assert_eq!(ips[1].to_string(), "1.1.1.1");
    }

    #[test]
    fn test_parse_servers_rejects_hostnames() {
        let servers = vec!["dns.google".to_string()];
        assert!(matches!(
            parse_servers(&servers),
            Err(ProbeError::InvalidDnsServer(_))
        ));
    }

    #[test]
    fn test_resolver_config_follows_system_without_servers() {
        let (config, opts) = resolver_config(&[]).unwrap();
        assert_eq!(opts.timeout, REVERSE_LOOKUP_TIMEOUT);
        assert_eq!(opts.attempts, 1);
        if let Ok((system, _)) = read_system_conf() {
            assert_eq!(config.name_servers(), system.name_servers());
        }
    }

    #[test]
    fn test_resolver_config_uses_given_servers() {
        let (config, _) = resolver_config(&["192.0.2.53".to_string()]).unwrap();
        let expected: IpAddr = "192.0.2.53".parse().unwrap();
        assert!(!config.name_servers().is_empty());
        assert!(config
            .name_servers()
            .iter()
            .all(|ns| ns.socket_addr.ip() == expected));
    }

    #[tokio::test]
    async fn test_reverse_lookup_of_non_address_is_none() {
        let rdns = ReverseDns::new(&[]).unwrap();
        assert_eq!(rdns.lookup("not-an-ip").await, None);
        assert_eq!(rdns.lookup("127.0.0.1:8080").await, None);
    }

    #[tokio::test]
    async fn test_reverse_lookup_is_bounded() {
        // TEST-NET-1 against an unroutable nameserver: must give up, not hang.
        let rdns = ReverseDns::new(&["192.0.2.1".to_string()]).unwrap();
        let start = std::time::Instant::now();
        assert_eq!(rdns.lookup("192.0.2.10").await, None);
        assert!(start.elapsed() < REVERSE_LOOKUP_TIMEOUT + Duration::from_secs(1));
    }
}
