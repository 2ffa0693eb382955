// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Crawler configuration, loaded once from a JSON file and shared read-only.

use crate::error::ConfigError;
use crate::models::mode::Mode;
use serde::{Deserialize, Deserializer};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

const DNS_PORT: u16 = 53;

/// Complete crawler configuration (`queue.json`)
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub mode: Mode,
    /// Host whose pages (and subdomains' pages) have their links followed
    pub main_domain: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    /// Seed URLs; a single string is accepted as well
    #[serde(rename = "toDownload", default, deserialize_with = "one_or_many")]
    pub to_download: Vec<String>,
    #[serde(rename = "dbconfig")]
    pub db: DatabaseConfig,
    #[serde(rename = "redisconfig", default)]
    pub redis: RedisConfig,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub prefer_ipv6: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub external_links: ExternalLinks,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100_000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

/// PostgreSQL connection settings
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub dbname: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// DNS cache settings. An empty host keeps the cache in process.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub host: String,
    /// Entry lifetime in hours
    #[serde(default = "default_expiration_hours")]
    pub expiration: u64,
}

fn default_expiration_hours() -> u64 {
    24
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            expiration: default_expiration_hours(),
        }
    }
}

impl RedisConfig {
    /// Connection URL, or `None` when no Redis host is configured
    pub fn url(&self) -> Option<String> {
        let host = self.host.trim();
        if host.is_empty() {
            None
        } else if host.starts_with("redis://") || host.starts_with("rediss://") {
            Some(host.to_string())
        } else {
            Some(format!("redis://{}/", host))
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expiration.saturating_mul(3600))
    }
}

/// What happens to links that leave the main domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalLinks {
    /// Persist once as an unfetched leaf record
    #[default]
    Record,
    /// Fetch and persist, but never follow their links
    Fetch,
    /// Drop them
    Ignore,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Load and validate settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Self::read(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a JSON file without validating it, so callers can apply
    /// overrides first
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(settings)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main_domain.trim().is_empty() {
            return Err(ConfigError::Invalid("main_domain must not be empty".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.mode.should_crawl() {
            self.validate_crawl_inputs()?;
        }
        Ok(())
    }

    fn validate_crawl_inputs(&self) -> Result<(), ConfigError> {
        if self.to_download.is_empty() {
            return Err(ConfigError::Invalid(
                "toDownload must contain at least one URL in spider mode".into(),
            ));
        }
        for seed in &self.to_download {
            let parsed = url::Url::parse(seed)
                .map_err(|e| ConfigError::Invalid(format!("invalid seed URL {}: {}", seed, e)))?;
            if parsed.host_str().is_none() {
                return Err(ConfigError::Invalid(format!("seed URL has no host: {}", seed)));
            }
        }
        if self.dns_server_addrs()?.is_empty() {
            return Err(ConfigError::Invalid(
                "dns_servers must contain at least one server in spider mode".into(),
            ));
        }
        Ok(())
    }

    /// Upstream DNS servers as socket addresses
    pub fn dns_server_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.dns_servers.iter().map(|s| parse_dns_server(s)).collect()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("lala-spider/{}", crate::VERSION))
    }
}

/// Parse `1.1.1.1`, `1.1.1.1:5353`, `2606:4700::1111` or `[::1]:53`.
/// Addresses without a port use 53.
pub fn parse_dns_server(server: &str) -> Result<SocketAddr, ConfigError> {
    let server = server.trim();
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    server
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::DnsServer(server.to_string()))
}
