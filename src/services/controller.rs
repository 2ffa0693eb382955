// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::scope::SiteScope;
use crate::models::settings::{ExternalLinks, Settings};
use crate::services::crawler::Fetcher;
use crate::services::db::Storage;
use crate::services::dns_resolver::DnsResolver;
use crate::services::frontier::Frontier;
use crate::services::links::normalize_link;
use crate::services::queue::WorkQueue;
use crate::services::worker::{CrawlContext, CrawlCounters, Worker, WorkerReport};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tunables for one crawl run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub queue_capacity: usize,
    pub fetch_timeout: Duration,
    pub prefer_ipv6: bool,
    pub external_links: ExternalLinks,
    /// Cancel the run after this many processed queue items
    pub max_pages: Option<usize>,
    /// Cancel the run after this much wall clock time
    pub max_duration: Option<Duration>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 100_000,
            fetch_timeout: Duration::from_secs(30),
            prefer_ipv6: false,
            external_links: ExternalLinks::default(),
            max_pages: None,
            max_duration: None,
        }
    }
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            queue_capacity: settings.queue_capacity,
            fetch_timeout: settings.fetch_timeout(),
            prefer_ipv6: settings.prefer_ipv6,
            external_links: settings.external_links,
            max_pages: settings.max_pages,
            max_duration: settings.max_duration_secs.map(Duration::from_secs),
        }
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub run_id: Uuid,
    /// URLs scheduled during the run, leaves included
    pub frontier_size: usize,
    pub processed: usize,
    pub saved: usize,
    /// Already stored by an earlier run
    pub skipped: usize,
    pub failed: usize,
    pub leaf_records: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub workers: Vec<WorkerReport>,
}

/// Owns the frontier and the queue of a run and the pool working on them
pub struct CrawlController {
    resolver: Arc<DnsResolver>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn Storage>,
    options: CrawlOptions,
    cancel: CancellationToken,
}

impl CrawlController {
    pub fn new(
        resolver: Arc<DnsResolver>,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Storage>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            storage,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts every run of this controller when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Crawl from a single seed
    pub async fn run(&self, seed_url: &str, site_scope_host: &str, concurrency: usize) -> CrawlSummary {
        self.run_seeds(&[seed_url.to_string()], site_scope_host, concurrency)
            .await
    }

    /// Crawl from every seed until the pool is quiescent or the run is cancelled
    pub async fn run_seeds(
        &self,
        seeds: &[String],
        site_scope_host: &str,
        concurrency: usize,
    ) -> CrawlSummary {
        let started = Instant::now();
        let ctx = Arc::new(self.new_context(site_scope_host));
        tracing::info!(
            run_id = %ctx.run_id,
            scope = ctx.scope.host(),
            seeds = seeds.len(),
            workers = concurrency,
            "crawl started"
        );

        let handles: Vec<JoinHandle<WorkerReport>> = (1..=concurrency.max(1))
            .map(|id| tokio::spawn(Worker::new(id, ctx.clone()).run()))
            .collect();
        let deadline = self.spawn_deadline(&ctx);

        Self::seed(&ctx, seeds).await;
        let workers = Self::join_workers(handles).await;
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let summary = Self::summarize(&ctx, workers, started.elapsed());
        tracing::info!(
            run_id = %summary.run_id,
            frontier_size = summary.frontier_size,
            processed = summary.processed,
            saved = summary.saved,
            skipped = summary.skipped,
            failed = summary.failed,
            leaf_records = summary.leaf_records,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "crawl finished"
        );
        summary
    }

    fn new_context(&self, site_scope_host: &str) -> CrawlContext {
        let cancel = self.cancel.child_token();
        CrawlContext {
            run_id: Uuid::now_v7(),
            queue: WorkQueue::new(self.options.queue_capacity, cancel.clone()),
            frontier: Frontier::new(),
            resolver: self.resolver.clone(),
            fetcher: self.fetcher.clone(),
            storage: self.storage.clone(),
            scope: SiteScope::new(site_scope_host),
            options: self.options.clone(),
            counters: CrawlCounters::default(),
            cancel,
        }
    }

    /// Seeds are pushed under a hold so the pool cannot drain in between
    async fn seed(ctx: &CrawlContext, seeds: &[String]) {
        ctx.queue.hold();
        for seed in seeds {
            let Some(url) = normalize_link(seed) else {
                tracing::warn!(seed = %seed, "skipping seed that is not an http(s) URL");
                continue;
            };
            let url = url.to_string();
            if !ctx.frontier.add_if_absent(&url) {
                continue;
            }
            if !ctx.queue.push(url).await {
                break;
            }
        }
        ctx.queue.complete();
    }

    fn spawn_deadline(&self, ctx: &Arc<CrawlContext>) -> Option<JoinHandle<()>> {
        let max_duration = self.options.max_duration?;
        let cancel = ctx.cancel.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(max_duration) => {
                    tracing::info!(?max_duration, "time limit reached, cancelling crawl");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        }))
    }

    async fn join_workers(handles: Vec<JoinHandle<WorkerReport>>) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(handles.len());
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(error = %e, "worker task failed"),
            }
        }
        reports
    }

    fn summarize(ctx: &CrawlContext, workers: Vec<WorkerReport>, elapsed: Duration) -> CrawlSummary {
        let counters = &ctx.counters;
        CrawlSummary {
            run_id: ctx.run_id,
            frontier_size: ctx.frontier.len(),
            processed: counters.processed.load(Ordering::SeqCst),
            saved: counters.saved.load(Ordering::SeqCst),
            skipped: counters.skipped.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            leaf_records: counters.leaf_records.load(Ordering::SeqCst),
            cancelled: ctx.cancel.is_cancelled(),
            elapsed,
            workers,
        }
    }
}
