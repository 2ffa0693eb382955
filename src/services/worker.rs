// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::error::PipelineError;
use crate::models::crawler::{FetchRequest, FetchResult, PageOutcome};
use crate::models::db::{content_fingerprint, CrawledContent};
use crate::models::scope::SiteScope;
use crate::models::settings::ExternalLinks;
use crate::services::controller::CrawlOptions;
use crate::services::crawler::Fetcher;
use crate::services::db::Storage;
use crate::services::dns_resolver::DnsResolver;
use crate::services::frontier::Frontier;
use crate::services::links::{extract_links, extract_text, extract_title, normalize_link};
use crate::services::queue::WorkQueue;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

/// Lifecycle of a worker task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Running => write!(f, "running"),
            WorkerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// What a worker did during one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub id: usize,
    pub processed: usize,
    pub failed: usize,
    pub state: WorkerState,
}

/// Run-wide counters shared by all workers
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pub processed: AtomicUsize,
    pub saved: AtomicUsize,
    pub skipped: AtomicUsize,
    pub failed: AtomicUsize,
    pub leaf_records: AtomicUsize,
}

/// State shared by every worker of one run
pub struct CrawlContext {
    pub run_id: Uuid,
    pub queue: WorkQueue,
    pub frontier: Frontier,
    pub resolver: Arc<DnsResolver>,
    pub fetcher: Arc<dyn Fetcher>,
    pub storage: Arc<dyn Storage>,
    pub scope: SiteScope,
    pub options: CrawlOptions,
    pub counters: CrawlCounters,
    pub cancel: CancellationToken,
}

/// Drives queue items through resolve, fetch, persist and expand
pub struct Worker {
    id: usize,
    ctx: Arc<CrawlContext>,
}

impl Worker {
    pub fn new(id: usize, ctx: Arc<CrawlContext>) -> Self {
        Self { id, ctx }
    }

    /// Process items until the queue drains or the run is cancelled
    pub async fn run(self) -> WorkerReport {
        let mut report = WorkerReport {
            id: self.id,
            processed: 0,
            failed: 0,
            state: WorkerState::Running,
        };
        tracing::debug!(worker = self.id, "worker started");

        while let Some(url) = self.ctx.queue.pop().await {
            if !self.handle(&url).await {
                report.failed += 1;
            }
            report.processed += 1;
            self.ctx.queue.complete();
            self.enforce_page_limit();
        }

        report.state = WorkerState::Stopped;
        tracing::debug!(
            worker = self.id,
            processed = report.processed,
            failed = report.failed,
            "worker stopped"
        );
        report
    }

    /// Returns false when the URL was abandoned
    async fn handle(&self, url: &str) -> bool {
        let counters = &self.ctx.counters;
        counters.processed.fetch_add(1, Ordering::SeqCst);

        match self.process_url(url).await {
            Ok(PageOutcome::AlreadyStored) => {
                counters.skipped.fetch_add(1, Ordering::SeqCst);
                tracing::info!(worker = self.id, url, "already stored, skipping");
                true
            }
            Ok(PageOutcome::Fetched {
                stored,
                enqueued,
                leaves,
            }) => {
                if stored {
                    counters.saved.fetch_add(1, Ordering::SeqCst);
                }
                tracing::info!(worker = self.id, url, stored, enqueued, leaves, "page processed");
                true
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    worker = self.id,
                    url,
                    error_type = %e.kind(),
                    error = %e,
                    "abandoned URL"
                );
                false
            }
        }
    }

    fn enforce_page_limit(&self) {
        let Some(max_pages) = self.ctx.options.max_pages else {
            return;
        };
        if self.ctx.counters.processed.load(Ordering::SeqCst) >= max_pages
            && !self.ctx.cancel.is_cancelled()
        {
            tracing::info!(max_pages, "page limit reached, cancelling crawl");
            self.ctx.cancel.cancel();
        }
    }

    /// Process one URL through all stages
    pub async fn process_url(&self, url: &str) -> Result<PageOutcome, PipelineError> {
        let parsed = Url::parse(url).map_err(|e| PipelineError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| PipelineError::InvalidUrl {
                url: url.to_string(),
                reason: "URL has no host".to_string(),
            })?
            .to_string();

        // Stage 1: Skip URLs stored by an earlier run
        if self.already_stored(url).await {
            return Ok(PageOutcome::AlreadyStored);
        }

        // Stage 2: Resolve and fetch with the host pinned
        let ip = self
            .ctx
            .resolver
            .resolve_with_preference(&host, self.ctx.options.prefer_ipv6)
            .await?;
        let result = self
            .ctx
            .fetcher
            .fetch(FetchRequest {
                url: url.to_string(),
                ip,
                timeout: self.ctx.options.fetch_timeout,
            })
            .await?;

        // Stage 3: Follow the page to where it was served from
        let served = Url::parse(&result.url).unwrap_or(parsed);
        let served_host = served.host_str().unwrap_or(&host).to_string();
        if result.url != url && !self.ctx.frontier.add_if_absent(&result.url) {
            tracing::debug!(worker = self.id, url, served = %result.url, "redirected to a scheduled URL");
            return Ok(PageOutcome::Fetched {
                stored: false,
                enqueued: 0,
                leaves: 0,
            });
        }

        // Stage 4: Persist
        let stored = self.persist(self.build_record(&served_host, ip, &result)).await;

        // Stage 5: Expand links of in-scope pages
        let (enqueued, leaves) = if self.ctx.scope.contains_host(&served_host) {
            self.expand_links(&result.markup, &result.url).await
        } else {
            (0, 0)
        };

        Ok(PageOutcome::Fetched {
            stored,
            enqueued,
            leaves,
        })
    }

    async fn already_stored(&self, url: &str) -> bool {
        match self.ctx.storage.exists_by_url(url).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(worker = self.id, url, error = %e, "existence check failed");
                false
            }
        }
    }

    fn build_record(&self, host: &str, ip: IpAddr, result: &FetchResult) -> CrawledContent {
        let mut metadata = BTreeMap::new();
        metadata.insert("resolved_ip".to_string(), ip.to_string());
        metadata.insert("run_id".to_string(), self.ctx.run_id.to_string());

        CrawledContent {
            domain: host.to_string(),
            url: result.url.clone(),
            text_content: extract_text(&result.markup),
            title: extract_title(&result.markup).unwrap_or_default(),
            http_status: i32::from(result.status),
            metadata,
            content_hash: content_fingerprint(&result.markup),
            crawled_at: Utc::now(),
        }
    }

    /// Failures are logged and do not abandon the page
    async fn persist(&self, record: CrawledContent) -> bool {
        match self.ctx.storage.save(&record).await {
            Ok(stored) => stored,
            Err(e) => {
                let e = PipelineError::from(e);
                tracing::warn!(
                    worker = self.id,
                    url = %record.url,
                    error_type = %e.kind(),
                    error = %e,
                    "failed to save content"
                );
                false
            }
        }
    }

    /// Returns how many links were enqueued and how many leaves were saved
    async fn expand_links(&self, markup: &str, page_url: &str) -> (usize, usize) {
        let mut enqueued = 0;
        let mut leaves = 0;

        for parsed in extract_links(markup, page_url)
            .iter()
            .filter_map(|link| normalize_link(link))
        {
            let link = parsed.to_string();
            let follow = self.ctx.scope.contains_url(&parsed)
                || self.ctx.options.external_links == ExternalLinks::Fetch;

            if follow {
                if !self.ctx.frontier.add_if_absent(&link) {
                    continue;
                }
                if !self.ctx.queue.push(link).await {
                    break;
                }
                enqueued += 1;
            } else if self.ctx.options.external_links == ExternalLinks::Record
                && self.ctx.frontier.add_if_absent(&link)
                && self.save_leaf(&parsed, page_url).await
            {
                leaves += 1;
            }
        }

        (enqueued, leaves)
    }

    async fn save_leaf(&self, link: &Url, page_url: &str) -> bool {
        let host = link.host_str().unwrap_or_default();
        let leaf = CrawledContent::leaf(host, link.as_str(), page_url);
        match self.ctx.storage.save(&leaf).await {
            Ok(stored) => {
                if stored {
                    self.ctx.counters.leaf_records.fetch_add(1, Ordering::SeqCst);
                }
                stored
            }
            Err(e) => {
                tracing::warn!(worker = self.id, url = %link, error = %e, "failed to save leaf record");
                false
            }
        }
    }
}
