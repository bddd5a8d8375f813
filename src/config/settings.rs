//! Application settings and paths.
//!
//! Manages the XDG-compliant configuration path, the persisted settings
//! file, and the immutable per-scan settings derived from it.

use crate::error::{ConfigError, ConfigResult};
use crate::output::OutputFormat;
use crate::scanner::probe::DEFAULT_RETRY_BACKOFF;
use crate::scanner::rate_limiter::RateLimiter;
use crate::types::clamp_workers;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/ipsift)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the XDG directories for this user.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "ipsift", "ipsift").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Concurrent probes.
    pub workers: usize,
    /// Retries per URL after the first attempt.
    pub max_retries: u32,
    /// Requests per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Bucket capacity, 0 to use the rate.
    pub burst: u32,
    /// Base of the linear retry backoff, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Proxy URL (http, https or socks5).
    pub proxy: Option<String>,
    /// Nameservers used instead of the system resolver.
    pub dns_servers: Vec<String>,
    /// Enrich results with reverse DNS names.
    pub reverse_dns: bool,
    /// Default report format.
    pub format: OutputFormat,
    /// Directory for exported reports; the current directory when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            workers: 100,
            max_retries: 2,
            rate_limit: 0,
            burst: 0,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF.as_millis() as u64,
            proxy: None,
            dns_servers: Vec::new(),
            reverse_dns: true,
            format: OutputFormat::Text,
            output_dir: None,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if there is no file.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let paths = Paths::new()?;
        fs::create_dir_all(&paths.config_dir)?;
        let file = paths.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The scan settings these defaults describe.
    pub fn to_scan_settings(&self) -> ScanSettings {
        ScanSettings::default()
            .with_workers(self.workers)
            .with_max_retries(self.max_retries)
            .with_rate_limit(self.rate_limit, self.burst)
            .with_retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .with_proxy(self.proxy.clone())
            .with_dns_servers(self.dns_servers.clone())
            .with_reverse_dns(self.reverse_dns)
            .with_format(self.format)
    }
}

/// Settings for one scan, fixed before the first probe.
///
/// Built from [`AppSettings`] with command-line overrides applied, then
/// shared by reference with the probe client and the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub workers: usize,
    pub rate_limit: u32,
    pub burst: u32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub proxy: Option<String>,
    pub dns_servers: Vec<String>,
    pub reverse_dns: bool,
    pub format: OutputFormat,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: 100,
            rate_limit: 0,
            burst: 0,
            max_retries: 2,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            proxy: None,
            dns_servers: Vec::new(),
            reverse_dns: true,
            format: OutputFormat::Text,
        }
    }
}

impl ScanSettings {
    /// Set the worker count, clamped to the supported range.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = clamp_workers(workers);
        self
    }

    /// Set the request rate and bucket capacity.
    pub fn with_rate_limit(mut self, rate: u32, burst: u32) -> Self {
        self.rate_limit = rate;
        self.burst = burst;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Route every request through `proxy`; blank strings mean no proxy.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }

    pub fn with_dns_servers(mut self, servers: Vec<String>) -> Self {
        self.dns_servers = servers;
        self
    }

    pub fn with_reverse_dns(mut self, enabled: bool) -> Self {
        self.reverse_dns = enabled;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// A fresh rate limiter for these settings.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit, self.burst)
    }
}
