// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! In-memory collaborators for tests: fetcher, upstream DNS, caches and storage.

use crate::error::{CacheError, DnsError, FetchError, StorageError};
use crate::models::crawler::{FetchRequest, FetchResult};
use crate::models::db::{CrawledContent, StatRow};
use crate::services::dns_cache::DnsCache;
use crate::services::dns_resolver::Upstream;
use crate::services::crawler::Fetcher;
use crate::services::db::Storage;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

// =============================================================================
// Mock Fetcher
// =============================================================================

/// Serves canned pages and records every fetch.
/// Unknown URLs answer 404 with an empty body.
#[derive(Default)]
pub struct MockFetcher {
    pages: DashMap<String, (u16, String)>,
    redirects: DashMap<String, String>,
    timeouts: DashSet<String>,
    calls: DashMap<String, usize>,
    requests: Mutex<Vec<FetchRequest>>,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, markup: &str) -> Self {
        self.with_status(url, 200, markup)
    }

    pub fn with_status(self, url: &str, status: u16, markup: &str) -> Self {
        self.pages
            .insert(url.to_string(), (status, markup.to_string()));
        self
    }

    /// `from` is served by the page registered for `to`, as after a redirect
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Fetching `url` fails with a timeout
    pub fn with_timeout(self, url: &str) -> Self {
        self.timeouts.insert(url.to_string());
        self
    }

    /// Every fetch sleeps this long first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.get(url).map(|count| *count).unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    pub fn was_fetched(&self, url: &str) -> bool {
        self.fetch_count(url) > 0
    }

    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, FetchError> {
        *self.calls.entry(request.url.clone()).or_insert(0) += 1;
        self.requests.lock().await.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.timeouts.contains(&request.url) {
            return Err(FetchError::Timeout {
                url: request.url,
                timeout: request.timeout,
            });
        }

        let url = self
            .redirects
            .get(&request.url)
            .map(|target| target.value().clone())
            .unwrap_or(request.url);
        let (status, markup) = self
            .pages
            .get(&url)
            .map(|page| page.value().clone())
            .unwrap_or((404, String::new()));
        Ok(FetchResult {
            url,
            markup,
            status,
        })
    }
}

// =============================================================================
// Static Upstream DNS
// =============================================================================

/// Answers from a fixed host table and counts queries.
/// Unknown hosts get an empty answer.
#[derive(Default)]
pub struct StaticUpstream {
    records: DashMap<String, Vec<IpAddr>>,
    failing: DashSet<String>,
    queries: AtomicUsize,
    servers: Mutex<Vec<SocketAddr>>,
}

impl StaticUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host: &str, ips: &[&str]) -> Self {
        let ips = ips.iter().filter_map(|ip| ip.parse().ok()).collect();
        self.records.insert(host.to_string(), ips);
        self
    }

    /// Lookups of `host` fail as if the server did not answer
    pub fn with_failure(self, host: &str) -> Self {
        self.failing.insert(host.to_string());
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Servers queried, in order
    pub async fn servers_used(&self) -> Vec<SocketAddr> {
        self.servers.lock().await.clone()
    }
}

#[async_trait]
impl Upstream for StaticUpstream {
    async fn lookup(&self, server: SocketAddr, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.servers.lock().await.push(server);

        if self.failing.contains(host) {
            return Err(DnsError::Lookup {
                host: host.to_string(),
                server,
                message: "request timed out".to_string(),
            });
        }
        Ok(self
            .records
            .get(host)
            .map(|ips| ips.value().clone())
            .unwrap_or_default())
    }
}

// =============================================================================
// Broken DNS Cache
// =============================================================================

fn decode_error() -> CacheError {
    CacheError::Decode(serde::de::Error::custom("corrupted cache entry"))
}

/// Cache whose reads and/or writes fail with a decode error
#[derive(Default)]
pub struct BrokenDnsCache {
    fail_reads: bool,
    fail_writes: bool,
    writes: AtomicUsize,
}

impl BrokenDnsCache {
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn write_attempts(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsCache for BrokenDnsCache {
    async fn get(&self, _host: &str) -> Result<Option<Vec<IpAddr>>, CacheError> {
        if self.fail_reads {
            return Err(decode_error());
        }
        Ok(None)
    }

    async fn set(&self, _host: &str, _ips: &[IpAddr], _ttl: Duration) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(decode_error());
        }
        Ok(())
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

fn unavailable() -> StorageError {
    StorageError::Database(sqlx::Error::PoolTimedOut)
}

/// Content store with the same insert-if-absent semantics as the real table
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<CrawledContent>>,
    existing_urls: DashSet<String>,
    save_calls: AtomicUsize,
    fail_saves: bool,
    fail_exists: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `save` fails as if the database were unreachable
    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    /// Every `exists_by_url` fails as if the database were unreachable
    pub fn failing_exists() -> Self {
        Self {
            fail_exists: true,
            ..Self::default()
        }
    }

    /// Pretend `url` was stored by an earlier run
    pub fn with_existing_url(self, url: &str) -> Self {
        self.existing_urls.insert(url.to_string());
        self
    }

    /// Every `save` call, including ones dropped on a hash conflict
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Rows actually written, in insertion order
    pub async fn records(&self) -> Vec<CrawledContent> {
        self.records.lock().await.clone()
    }

    pub async fn urls(&self) -> Vec<String> {
        self.records
            .lock()
            .await
            .iter()
            .map(|record| record.url.clone())
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save(&self, content: &CrawledContent) -> Result<bool, StorageError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(unavailable());
        }
        let mut records = self.records.lock().await;
        if records
            .iter()
            .any(|record| record.content_hash == content.content_hash)
        {
            return Ok(false);
        }
        records.push(content.clone());
        Ok(true)
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool, StorageError> {
        if self.fail_exists {
            return Err(unavailable());
        }
        if self.existing_urls.contains(url) {
            return Ok(true);
        }
        Ok(self.records.lock().await.iter().any(|record| record.url == url))
    }

    async fn exists_by_hash(&self, content_hash: &str) -> Result<bool, StorageError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .any(|record| record.content_hash == content_hash))
    }

    async fn get_all(&self) -> Result<Vec<StatRow>, StorageError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .map(|record| StatRow {
                domain: record.domain.clone(),
                url: record.url.clone(),
                status: record.http_status,
            })
            .collect())
    }
}
