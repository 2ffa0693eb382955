// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::error::StorageError;
use crate::models::db::{CrawledContent, StatRow};
use crate::models::settings::DatabaseConfig;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Content store for crawled pages and leaf records
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create the schema if it does not exist yet
    async fn init(&self) -> Result<(), StorageError>;

    /// Insert `content` unless its hash is already stored.
    /// Returns whether a row was written.
    async fn save(&self, content: &CrawledContent) -> Result<bool, StorageError>;

    async fn exists_by_url(&self, url: &str) -> Result<bool, StorageError>;

    async fn exists_by_hash(&self, content_hash: &str) -> Result<bool, StorageError>;

    async fn get_all(&self) -> Result<Vec<StatRow>, StorageError>;
}

/// PostgreSQL store for the `crawled_content` table
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect and verify the server is reachable
    pub async fn connect(config: &DatabaseConfig, max_connections: u32) -> Result<Self, StorageError> {
        let ssl_mode: PgSslMode = config.ssl_mode.parse()?;
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.dbname)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn save(&self, content: &CrawledContent) -> Result<bool, StorageError> {
        let metadata = serde_json::to_value(&content.metadata)?;

        let result = sqlx::query(
            "INSERT INTO crawled_content
                (domain, url, text_content, title, status, metadata, content_hash, crawled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (content_hash) DO NOTHING",
        )
        .bind(&content.domain)
        .bind(&content.url)
        .bind(&content.text_content)
        .bind(&content.title)
        .bind(content.http_status)
        .bind(metadata)
        .bind(&content.content_hash)
        .bind(content.crawled_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool, StorageError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM crawled_content WHERE url = $1)",
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn exists_by_hash(&self, content_hash: &str) -> Result<bool, StorageError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM crawled_content WHERE content_hash = $1)",
        )
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_all(&self) -> Result<Vec<StatRow>, StorageError> {
        let rows = sqlx::query_as::<_, StatRow>(
            "SELECT domain, url, status FROM crawled_content ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
