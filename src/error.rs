// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Error types shared across the crawler services.

use crate::models::db::CrawlErrorType;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the DNS cache. A missing key is not an error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to decode cached entry: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure resolving a hostname.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("lookup of {host} via {server} failed: {message}")]
    Lookup {
        host: String,
        server: SocketAddr,
        message: String,
    },

    #[error("no IP addresses found for {0}")]
    NoAddresses(String),

    #[error("no DNS servers configured")]
    NoServers,
}

/// Failure fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetch of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure reading from or writing to the content store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("failed to encode metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid DNS server address '{0}'")]
    DnsServer(String),

    #[error("{0}")]
    Invalid(String),
}

/// Reason a single URL was abandoned by a worker.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Resolution(#[from] DnsError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl PipelineError {
    /// Category used in structured logs
    pub fn kind(&self) -> CrawlErrorType {
        match self {
            PipelineError::InvalidUrl { .. } => CrawlErrorType::InvalidUrl,
            PipelineError::Resolution(_) => CrawlErrorType::ResolutionError,
            PipelineError::Fetch(_) => CrawlErrorType::FetchError,
            PipelineError::Persistence(_) => CrawlErrorType::DatabaseError,
        }
    }
}
