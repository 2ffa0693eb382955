// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::Context;
use clap::Parser;
use lala_spider::models::mode::Mode;
use lala_spider::models::settings::Settings;
use lala_spider::services::controller::{CrawlController, CrawlOptions};
use lala_spider::services::crawler::HttpFetcher;
use lala_spider::services::db::{PostgresStorage, Storage};
use lala_spider::services::dns_cache::{DnsCache, MemoryDnsCache, RedisDnsCache};
use lala_spider::services::dns_resolver::{DnsResolver, HickoryUpstream};
use lala_spider::services::logging::{describe_database, init_logging, redact_url_password};
use lala_spider::services::stats::build_report;
use lala_spider::VERSION;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lala-spider")]
#[command(about = "Concurrent site crawler with DNS caching and deduplicated storage")]
#[command(version = VERSION)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LALA_SPIDER_CONFIG", default_value = "queue.json")]
    config: PathBuf,

    /// Override the mode from the configuration file
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Override the number of workers
    #[arg(long)]
    workers: Option<usize>,

    /// Print the crawl summary or statistics as JSON
    #[arg(long)]
    json: bool,
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::read(&cli.config)?;
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    settings.validate()?;
    Ok(settings)
}

async fn build_dns_cache(settings: &Settings) -> anyhow::Result<Arc<dyn DnsCache>> {
    match settings.redis.url() {
        Some(url) => {
            let cache = RedisDnsCache::connect(&url).await.with_context(|| {
                format!("failed to connect to Redis at {}", redact_url_password(&url))
            })?;
            tracing::info!(redis = %redact_url_password(&url), "connected to DNS cache");
            Ok(Arc::new(cache))
        }
        None => {
            tracing::info!("no Redis host configured, using in-process DNS cache");
            Ok(Arc::new(MemoryDnsCache::new()))
        }
    }
}

async fn run_spider(settings: &Settings, storage: Arc<dyn Storage>, json: bool) -> anyhow::Result<()> {
    let servers = settings.dns_server_addrs()?;
    let cache = build_dns_cache(settings).await?;
    let upstream = Arc::new(HickoryUpstream::new(&servers));
    let resolver = Arc::new(DnsResolver::new(
        cache,
        upstream,
        servers,
        settings.redis.ttl(),
    )?);
    let fetcher = Arc::new(HttpFetcher::new(settings.user_agent()));

    let controller = CrawlController::new(
        resolver,
        fetcher,
        storage,
        CrawlOptions::from_settings(settings),
    );

    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping crawl");
            token.cancel();
        }
    });

    let summary = controller
        .run_seeds(&settings.to_download, &settings.main_domain, settings.workers)
        .await;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

async fn run_stat(settings: &Settings, storage: &dyn Storage, json: bool) -> anyhow::Result<()> {
    let report = build_report(storage, &settings.main_domain)
        .await
        .context("failed to load records")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;
    init_logging(&settings.logging)?;

    tracing::info!(
        version = VERSION,
        mode = %settings.mode,
        config = %cli.config.display(),
        "lala-spider starting"
    );

    let max_connections = u32::try_from(settings.workers).unwrap_or(u32::MAX).saturating_add(1);
    let postgres = PostgresStorage::connect(&settings.db, max_connections)
        .await
        .with_context(|| format!("failed to connect to database {}", describe_database(&settings.db)))?;
    postgres
        .init()
        .await
        .context("failed to initialize database schema")?;
    tracing::info!(database = %describe_database(&settings.db), "database ready");

    let storage: Arc<dyn Storage> = Arc::new(postgres.clone());
    let result = match settings.mode {
        Mode::Spider => run_spider(&settings, storage, cli.json).await,
        Mode::Stat => run_stat(&settings, storage.as_ref(), cli.json).await,
    };

    postgres.close().await;
    result
}
