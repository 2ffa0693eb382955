// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use lala_spider::models::settings::ExternalLinks;
use lala_spider::services::controller::{CrawlController, CrawlOptions, CrawlSummary};
use lala_spider::services::dns_cache::MemoryDnsCache;
use lala_spider::services::dns_resolver::DnsResolver;
use lala_spider::services::test_dependencies::{MemoryStorage, MockFetcher, StaticUpstream};
use lala_spider::services::worker::WorkerState;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

const SEED: &str = "http://site.test/";
const SCOPE: &str = "site.test";
const CRAWL_DEADLINE: Duration = Duration::from_secs(10);

/// Markup whose trailing bytes are unique to `id`
fn page(id: &str, body: &str) -> String {
    format!("<html><head><title>{id}</title></head><body>{body}</body></html><!-- {id} -->")
}

fn upstream() -> StaticUpstream {
    StaticUpstream::new()
        .with_host("site.test", &["10.0.0.1"])
        .with_host("blog.site.test", &["10.0.0.3"])
        .with_host("ext.test", &["10.0.0.2"])
}

fn resolver(upstream: StaticUpstream) -> Arc<DnsResolver> {
    Arc::new(
        DnsResolver::new(
            Arc::new(MemoryDnsCache::new()),
            Arc::new(upstream),
            vec!["127.0.0.53:53".parse().unwrap()],
            Duration::from_secs(3600),
        )
        .unwrap(),
    )
}

/// Seed with two same-site links and one external link
fn site_fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_page(
            SEED,
            &page(
                "home",
                r#"<a href="/a">A</a><a href="/b">B</a><a href="http://ext.test/">Ext</a>"#,
            ),
        )
        .with_page("http://site.test/a", &page("a", r#"<a href="/">Home</a>"#))
        .with_page("http://site.test/b", &page("b", r#"<a href="/a">A</a>"#))
        .with_page(
            "http://ext.test/",
            &page("ext", r#"<a href="http://ext.test/deeper">Deeper</a>"#),
        )
}

fn options(external_links: ExternalLinks) -> CrawlOptions {
    CrawlOptions {
        external_links,
        ..CrawlOptions::default()
    }
}

async fn crawl(
    fetcher: &Arc<MockFetcher>,
    storage: &Arc<MemoryStorage>,
    options: CrawlOptions,
    concurrency: usize,
) -> CrawlSummary {
    crawl_seeds(fetcher, storage, options, &[SEED], concurrency).await
}

async fn crawl_seeds(
    fetcher: &Arc<MockFetcher>,
    storage: &Arc<MemoryStorage>,
    options: CrawlOptions,
    seeds: &[&str],
    concurrency: usize,
) -> CrawlSummary {
    let controller = CrawlController::new(
        resolver(upstream()),
        fetcher.clone(),
        storage.clone(),
        options,
    );
    let seeds: Vec<String> = seeds.iter().map(|seed| seed.to_string()).collect();
    tokio::time::timeout(CRAWL_DEADLINE, controller.run_seeds(&seeds, SCOPE, concurrency))
        .await
        .expect("crawl did not terminate")
}

#[tokio::test]
async fn test_ignore_policy_crawls_only_the_site() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 4).await;

    assert_eq!(storage.save_calls(), 3);
    assert_eq!(summary.frontier_size, 3);
    assert_eq!(fetcher.total_fetches(), 3);
    assert_eq!(fetcher.fetch_count(SEED), 1);
    assert_eq!(fetcher.fetch_count("http://site.test/a"), 1);
    assert_eq!(fetcher.fetch_count("http://site.test/b"), 1);
    assert!(!fetcher.was_fetched("http://ext.test/"));

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.saved, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.leaf_records, 0);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_record_policy_stores_external_link_as_leaf() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Record), 4).await;

    assert_eq!(storage.save_calls(), 4);
    assert_eq!(summary.frontier_size, 4);
    assert_eq!(summary.leaf_records, 1);
    assert!(!fetcher.was_fetched("http://ext.test/"));

    let records = storage.records().await;
    let leaf = records
        .iter()
        .find(|record| record.url == "http://ext.test/")
        .expect("leaf record stored");
    assert!(leaf.is_leaf());
    assert_eq!(leaf.domain, "ext.test");
    assert_eq!(
        leaf.metadata.get("discovered_on").map(String::as_str),
        Some(SEED)
    );
}

#[tokio::test]
async fn test_fetch_policy_goes_one_hop_outside() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Fetch), 4).await;

    assert_eq!(fetcher.fetch_count("http://ext.test/"), 1);
    assert!(!fetcher.was_fetched("http://ext.test/deeper"));
    assert_eq!(storage.save_calls(), 4);
    assert_eq!(summary.frontier_size, 4);
    assert_eq!(summary.leaf_records, 0);
}

#[tokio::test]
async fn test_stored_url_is_skipped_before_any_work() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::new().with_existing_url(SEED));

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 2).await;

    assert_eq!(fetcher.total_fetches(), 0);
    assert_eq!(storage.save_calls(), 0);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.frontier_size, 1);
}

#[tokio::test]
async fn test_failures_abandon_only_their_url() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(
                SEED,
                &page(
                    "home",
                    r#"<a href="/slow">Slow</a><a href="http://nowhere.site.test/">Gone</a><a href="/ok">Ok</a>"#,
                ),
            )
            .with_timeout("http://site.test/slow")
            .with_page("http://site.test/ok", &page("ok", "")),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 3).await;

    // nowhere.site.test has no DNS records, /slow times out
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.saved, 2);
    assert_eq!(fetcher.fetch_count("http://site.test/slow"), 1);
    assert!(!fetcher.was_fetched("http://nowhere.site.test/"));
    assert_eq!(
        storage.urls().await.len(),
        2,
        "only the seed and /ok are stored"
    );
}

#[tokio::test]
async fn test_error_pages_are_recorded_with_status() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(SEED, &page("home", r#"<a href="/missing">Missing</a>"#))
            .with_status("http://site.test/missing", 404, &page("missing", "Not found")),
    );
    let storage = Arc::new(MemoryStorage::new());

    crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 2).await;

    let records = storage.records().await;
    let missing = records
        .iter()
        .find(|record| record.url == "http://site.test/missing")
        .unwrap();
    assert_eq!(missing.http_status, 404);
    assert_eq!(missing.title, "missing");
}

#[tokio::test]
async fn test_identical_content_is_stored_once() {
    let same = page("same", "identical body");
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(SEED, &page("home", r#"<a href="/x">X</a><a href="/y">Y</a>"#))
            .with_page("http://site.test/x", &same)
            .with_page("http://site.test/y", &same),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 2).await;

    assert_eq!(storage.save_calls(), 3);
    assert_eq!(summary.saved, 2);
    assert_eq!(storage.records().await.len(), 2);
}

#[tokio::test]
async fn test_fragments_and_duplicates_are_fetched_once() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(
                SEED,
                &page(
                    "home",
                    r##"<a href="/a#top">1</a><a href="/a#bottom">2</a><a href="/a">3</a><a href="mailto:x@site.test">4</a>"##,
                ),
            )
            .with_page("http://site.test/a", &page("a", "")),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 4).await;

    assert_eq!(fetcher.fetch_count("http://site.test/a"), 1);
    assert_eq!(summary.frontier_size, 2);
}

#[tokio::test]
async fn test_subdomain_pages_are_expanded() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(SEED, &page("home", r#"<a href="http://blog.site.test/">Blog</a>"#))
            .with_page(
                "http://blog.site.test/",
                &page("blog", r#"<a href="/post">Post</a>"#),
            )
            .with_page("http://blog.site.test/post", &page("post", "")),
    );
    let storage = Arc::new(MemoryStorage::new());

    crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 2).await;

    assert_eq!(fetcher.fetch_count("http://blog.site.test/post"), 1);
    let requests = fetcher.requests().await;
    let blog = requests
        .iter()
        .find(|request| request.url == "http://blog.site.test/")
        .unwrap();
    assert_eq!(blog.ip, "10.0.0.3".parse::<IpAddr>().unwrap());
}

#[tokio::test]
async fn test_fetches_are_pinned_to_preferred_address() {
    let upstream = StaticUpstream::new().with_host("site.test", &["10.0.0.1", "2001:db8::1"]);
    let fetcher = Arc::new(MockFetcher::new().with_page(SEED, &page("home", "")));
    let storage = Arc::new(MemoryStorage::new());

    let controller = CrawlController::new(
        resolver(upstream),
        fetcher.clone(),
        storage.clone(),
        CrawlOptions {
            prefer_ipv6: true,
            fetch_timeout: Duration::from_secs(7),
            ..CrawlOptions::default()
        },
    );
    controller.run(SEED, SCOPE, 1).await;

    let requests = fetcher.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].ip, "2001:db8::1".parse::<IpAddr>().unwrap());
    assert_eq!(requests[0].timeout, Duration::from_secs(7));
}

#[tokio::test]
async fn test_pool_stops_on_quiescence_without_idle_wait() {
    let fetcher = Arc::new(MockFetcher::new().with_page(SEED, &page("home", "")));
    let storage = Arc::new(MemoryStorage::new());

    let controller = CrawlController::new(
        resolver(upstream()),
        fetcher.clone(),
        storage.clone(),
        CrawlOptions::default(),
    );
    let summary = tokio::time::timeout(Duration::from_secs(1), controller.run(SEED, SCOPE, 8))
        .await
        .expect("pool should stop as soon as the queue drains");

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.workers.len(), 8);
    assert!(summary
        .workers
        .iter()
        .all(|report| report.state == WorkerState::Stopped));
    assert_eq!(
        summary.workers.iter().map(|report| report.processed).sum::<usize>(),
        1
    );
}

/// Pages /p0 -> /p1 -> ... each linking to the next
fn chain_fetcher(length: usize) -> MockFetcher {
    (0..length).fold(MockFetcher::new(), |fetcher, i| {
        let url = if i == 0 {
            SEED.to_string()
        } else {
            format!("http://site.test/p{i}")
        };
        let next = format!(r#"<a href="/p{}">next</a>"#, i + 1);
        fetcher.with_page(&url, &page(&format!("p{i}"), &next))
    })
}

#[tokio::test]
async fn test_max_pages_cancels_the_run() {
    let fetcher = Arc::new(chain_fetcher(50));
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(
        &fetcher,
        &storage,
        CrawlOptions {
            max_pages: Some(5),
            ..CrawlOptions::default()
        },
        1,
    )
    .await;

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 5);
    assert_eq!(fetcher.total_fetches(), 5);
}

#[tokio::test]
async fn test_max_duration_cancels_the_run() {
    let fetcher = Arc::new(chain_fetcher(1000).with_delay(Duration::from_millis(20)));
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(
        &fetcher,
        &storage,
        CrawlOptions {
            max_duration: Some(Duration::from_millis(150)),
            ..CrawlOptions::default()
        },
        2,
    )
    .await;

    assert!(summary.cancelled);
    assert!(summary.processed < 1000);
}

#[tokio::test]
async fn test_external_cancellation_stops_the_pool() {
    let fetcher = Arc::new(chain_fetcher(1000).with_delay(Duration::from_millis(20)));
    let storage = Arc::new(MemoryStorage::new());
    let controller = CrawlController::new(
        resolver(upstream()),
        fetcher.clone(),
        storage.clone(),
        CrawlOptions::default(),
    );

    let token = controller.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let summary = tokio::time::timeout(CRAWL_DEADLINE, controller.run(SEED, SCOPE, 3))
        .await
        .expect("cancelled crawl did not stop");

    assert!(summary.cancelled);
    assert!(summary.processed < 1000);
    assert!(summary
        .workers
        .iter()
        .all(|report| report.state == WorkerState::Stopped));
}

#[tokio::test]
async fn test_multiple_seeds_share_one_frontier() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(SEED, &page("home", r#"<a href="/shared">Shared</a>"#))
            .with_page(
                "http://site.test/other",
                &page("other", r#"<a href="/shared">Shared</a>"#),
            )
            .with_page("http://site.test/shared", &page("shared", "")),
    );
    let storage = Arc::new(MemoryStorage::new());
    let controller = CrawlController::new(
        resolver(upstream()),
        fetcher.clone(),
        storage.clone(),
        CrawlOptions::default(),
    );

    let seeds = vec![
        SEED.to_string(),
        "http://site.test/other".to_string(),
        SEED.to_string(),
    ];
    let summary = tokio::time::timeout(CRAWL_DEADLINE, controller.run_seeds(&seeds, SCOPE, 4))
        .await
        .unwrap();

    assert_eq!(summary.frontier_size, 3);
    assert_eq!(fetcher.fetch_count(SEED), 1);
    assert_eq!(fetcher.fetch_count("http://site.test/shared"), 1);
}

#[tokio::test]
async fn test_no_seeds_finishes_immediately() {
    let fetcher = Arc::new(MockFetcher::new());
    let storage = Arc::new(MemoryStorage::new());
    let controller = CrawlController::new(
        resolver(upstream()),
        fetcher.clone(),
        storage.clone(),
        CrawlOptions::default(),
    );

    let summary = tokio::time::timeout(Duration::from_secs(1), controller.run_seeds(&[], SCOPE, 3))
        .await
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.frontier_size, 0);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_seed_without_path_matches_root_link() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(SEED, &page("home", r#"<a href="/">Home</a><a href="/a">A</a>"#))
            .with_page("http://site.test/a", &page("a", "")),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl_seeds(
        &fetcher,
        &storage,
        options(ExternalLinks::Ignore),
        &["http://site.test"],
        2,
    )
    .await;

    assert_eq!(summary.frontier_size, 2);
    assert_eq!(fetcher.fetch_count(SEED), 1);
    assert!(!fetcher.was_fetched("http://site.test"));
    assert_eq!(fetcher.total_fetches(), 2);
}

#[tokio::test]
async fn test_seeds_that_are_not_http_urls_are_skipped() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl_seeds(
        &fetcher,
        &storage,
        options(ExternalLinks::Ignore),
        &["mailto:admin@site.test", "not a url", SEED, "http://site.test/#top"],
        2,
    )
    .await;

    assert_eq!(summary.frontier_size, 3);
    assert_eq!(fetcher.fetch_count(SEED), 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_links_resolve_against_redirect_target() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_redirect("http://site.test/docs", "http://site.test/docs/")
            .with_page(
                "http://site.test/docs/",
                &page("docs", r#"<a href="intro">Intro</a>"#),
            )
            .with_page("http://site.test/docs/intro", &page("intro", "")),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl_seeds(
        &fetcher,
        &storage,
        options(ExternalLinks::Ignore),
        &["http://site.test/docs"],
        2,
    )
    .await;

    assert_eq!(fetcher.fetch_count("http://site.test/docs/intro"), 1);
    assert!(!fetcher.was_fetched("http://site.test/intro"));
    assert_eq!(summary.frontier_size, 3);

    let urls = storage.urls().await;
    assert!(urls.contains(&"http://site.test/docs/".to_string()));
    assert!(urls.contains(&"http://site.test/docs/intro".to_string()));
}

#[tokio::test]
async fn test_redirect_off_site_is_not_expanded() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(SEED, &page("home", r#"<a href="/moved">Moved</a>"#))
            .with_redirect("http://site.test/moved", "http://ext.test/")
            .with_page(
                "http://ext.test/",
                &page("ext", r#"<a href="http://ext.test/deeper">Deeper</a>"#),
            ),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Fetch), 2).await;

    assert!(!fetcher.was_fetched("http://ext.test/deeper"));
    assert_eq!(summary.saved, 2);

    let records = storage.records().await;
    let moved = records
        .iter()
        .find(|record| record.url == "http://ext.test/")
        .expect("redirect target stored");
    assert_eq!(moved.domain, "ext.test");
}

#[tokio::test]
async fn test_redirect_to_scheduled_url_is_processed_once() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page(
                SEED,
                &page("home", r#"<a href="/old">Old</a><a href="/new">New</a>"#),
            )
            .with_redirect("http://site.test/old", "http://site.test/new")
            .with_page("http://site.test/new", &page("new", r#"<a href="/">Home</a>"#)),
    );
    let storage = Arc::new(MemoryStorage::new());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 1).await;

    assert_eq!(summary.frontier_size, 3);
    assert_eq!(fetcher.fetch_count("http://site.test/old"), 1);
    assert_eq!(fetcher.fetch_count("http://site.test/new"), 1);
    assert_eq!(storage.save_calls(), 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_failed_saves_still_expand_links() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::failing_saves());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 3).await;

    assert_eq!(storage.save_calls(), 3);
    assert!(storage.records().await.is_empty());
    assert_eq!(summary.saved, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.frontier_size, 3);
    assert_eq!(fetcher.fetch_count("http://site.test/a"), 1);
    assert_eq!(fetcher.fetch_count("http://site.test/b"), 1);
}

#[tokio::test]
async fn test_failed_existence_check_treats_url_as_new() {
    let fetcher = Arc::new(site_fetcher());
    let storage = Arc::new(MemoryStorage::failing_exists());

    let summary = crawl(&fetcher, &storage, options(ExternalLinks::Ignore), 3).await;

    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.saved, 3);
    assert_eq!(summary.frontier_size, 3);
    assert_eq!(fetcher.total_fetches(), 3);
}
