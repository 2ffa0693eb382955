// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::error::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::net::IpAddr;
use std::time::{Duration, Instant};

const KEY_PREFIX: &str = "dns:";

/// Hostname to resolved addresses, with expiry owned by the cache.
#[async_trait]
pub trait DnsCache: Send + Sync {
    /// `Ok(None)` is a miss. Errors mean the cache itself could not be read.
    async fn get(&self, host: &str) -> Result<Option<Vec<IpAddr>>, CacheError>;

    async fn set(&self, host: &str, ips: &[IpAddr], ttl: Duration) -> Result<(), CacheError>;
}

fn cache_key(host: &str) -> String {
    format!("{}{}", KEY_PREFIX, host)
}

/// Redis-backed cache storing a JSON array of address strings per host
#[derive(Clone)]
pub struct RedisDnsCache {
    connection: MultiplexedConnection,
}

impl RedisDnsCache {
    /// Connect to Redis; fails fast when the server is unreachable
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl DnsCache for RedisDnsCache {
    async fn get(&self, host: &str) -> Result<Option<Vec<IpAddr>>, CacheError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(cache_key(host)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, host: &str, ips: &[IpAddr], ttl: Duration) -> Result<(), CacheError> {
        let value = serde_json::to_string(ips)?;
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(cache_key(host), value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}

/// In-process cache used when no Redis host is configured.
/// A TTL too large for `Instant` never expires.
#[derive(Debug, Default)]
pub struct MemoryDnsCache {
    entries: DashMap<String, (Vec<IpAddr>, Option<Instant>)>,
}

fn is_live(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| at > now)
}

impl MemoryDnsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DnsCache for MemoryDnsCache {
    async fn get(&self, host: &str) -> Result<Option<Vec<IpAddr>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(host) {
            let (ips, expires_at) = entry.value();
            if is_live(*expires_at, now) {
                return Ok(Some(ips.clone()));
            }
        }
        self.entries
            .remove_if(host, |_, (_, expires_at)| !is_live(*expires_at, now));
        Ok(None)
    }

    async fn set(&self, host: &str, ips: &[IpAddr], ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(host.to_string(), (ips.to_vec(), Instant::now().checked_add(ttl)));
        Ok(())
    }
}
