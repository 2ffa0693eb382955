// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Markup before this fraction of the page is left out of the fingerprint.
const FINGERPRINT_WINDOW_START: f64 = 0.8;

/// Status stored for records that were discovered but never fetched
pub const NOT_FETCHED_STATUS: i32 = 0;

/// Crawled page stored in the `crawled_content` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawledContent {
    pub domain: String,
    pub url: String,
    pub text_content: String,
    pub title: String,
    pub http_status: i32,
    pub metadata: BTreeMap<String, String>,
    /// Unique across the table; inserts with a known hash are dropped
    pub content_hash: String,
    pub crawled_at: DateTime<Utc>,
}

impl CrawledContent {
    /// Record for an off-scope link that is persisted without being fetched.
    ///
    /// The hash is taken over the URL so distinct leaves never collide.
    pub fn leaf(domain: &str, url: &str, discovered_on: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("leaf".to_string(), "true".to_string());
        metadata.insert("discovered_on".to_string(), discovered_on.to_string());

        Self {
            domain: domain.to_string(),
            url: url.to_string(),
            text_content: String::new(),
            title: String::new(),
            http_status: NOT_FETCHED_STATUS,
            metadata,
            content_hash: format!("{:x}", md5::compute(url.as_bytes())),
            crawled_at: Utc::now(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.http_status == NOT_FETCHED_STATUS
    }
}

/// Fingerprint of fetched markup: MD5 over the trailing fifth of the bytes.
///
/// Only the tail is hashed so that volatile headers at the top of a page do
/// not make otherwise identical pages look unique. The false-duplicate rate
/// of this heuristic has not been measured.
pub fn content_fingerprint(markup: &str) -> String {
    let bytes = markup.as_bytes();
    let start = (bytes.len() as f64 * FINGERPRINT_WINDOW_START) as usize;
    format!("{:x}", md5::compute(&bytes[start..]))
}

/// Projection of a stored record used by the statistics report
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StatRow {
    pub domain: String,
    pub url: String,
    pub status: i32,
}

/// Error categories for abandoned URLs
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlErrorType {
    /// Host missing or URL could not be parsed
    InvalidUrl,
    /// DNS cache read or upstream lookup failed
    ResolutionError,
    /// Failed to fetch the URL (network error, timeout, etc.)
    FetchError,
    /// Failed to read or write the content store
    DatabaseError,
}

impl std::fmt::Display for CrawlErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlErrorType::InvalidUrl => write!(f, "invalid_url"),
            CrawlErrorType::ResolutionError => write!(f, "resolution_error"),
            CrawlErrorType::FetchError => write!(f, "fetch_error"),
            CrawlErrorType::DatabaseError => write!(f, "database_error"),
        }
    }
}
