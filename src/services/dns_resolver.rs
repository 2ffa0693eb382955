// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Cache-first hostname resolution against a pool of upstream DNS servers.

use crate::error::DnsError;
use crate::services::dns_cache::DnsCache;
use async_trait::async_trait;
use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig, ResolverOpts,
};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use rand::Rng;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Address family of a resolved IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

/// IPv4-mapped IPv6 addresses count as IPv4.
pub fn ip_version(ip: &IpAddr) -> IpVersion {
    match ip {
        IpAddr::V4(_) => IpVersion::V4,
        IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => IpVersion::V4,
        IpAddr::V6(_) => IpVersion::V6,
    }
}

/// Pick one address from `ips` keeping upstream order within each family.
///
/// With `prefer_ipv6` the first v6 address wins if there is one, otherwise
/// the first v4 address is taken before falling back to v6.
pub fn select_preferred(ips: &[IpAddr], prefer_ipv6: bool) -> Option<IpAddr> {
    let first_of = |version: IpVersion| ips.iter().copied().find(|ip| ip_version(ip) == version);

    if prefer_ipv6 {
        if let Some(ip) = first_of(IpVersion::V6) {
            return Some(ip);
        }
    }
    first_of(IpVersion::V4).or_else(|| first_of(IpVersion::V6))
}

/// Single query to one upstream server
#[async_trait]
pub trait Upstream: Send + Sync {
    /// An empty list means the server answered without records.
    async fn lookup(&self, server: SocketAddr, host: &str) -> Result<Vec<IpAddr>, DnsError>;
}

/// `hickory-resolver` upstream with one resolver per configured server
pub struct HickoryUpstream {
    resolvers: HashMap<SocketAddr, TokioAsyncResolver>,
}

impl HickoryUpstream {
    pub fn new(servers: &[SocketAddr]) -> Self {
        let resolvers = servers
            .iter()
            .map(|server| (*server, Self::build_resolver(*server)))
            .collect();
        Self { resolvers }
    }

    fn build_resolver(server: SocketAddr) -> TokioAsyncResolver {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(server, Protocol::Udp));

        let mut opts = ResolverOpts::default();
        opts.timeout = UPSTREAM_TIMEOUT;
        opts.attempts = 1;
        opts.cache_size = 0;
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        TokioAsyncResolver::tokio(config, opts)
    }
}

#[async_trait]
impl Upstream for HickoryUpstream {
    async fn lookup(&self, server: SocketAddr, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let resolver = self
            .resolvers
            .get(&server)
            .ok_or_else(|| DnsError::Lookup {
                host: host.to_string(),
                server,
                message: "server is not in the configured pool".to_string(),
            })?;

        match resolver.lookup_ip(host).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(DnsError::Lookup {
                host: host.to_string(),
                server,
                message: e.to_string(),
            }),
        }
    }
}

/// Resolves hostnames through the cache, falling back to a random upstream
/// server on a miss. There is no failover between servers.
pub struct DnsResolver {
    cache: Arc<dyn DnsCache>,
    upstream: Arc<dyn Upstream>,
    servers: Vec<SocketAddr>,
    ttl: Duration,
}

impl DnsResolver {
    pub fn new(
        cache: Arc<dyn DnsCache>,
        upstream: Arc<dyn Upstream>,
        servers: Vec<SocketAddr>,
        ttl: Duration,
    ) -> Result<Self, DnsError> {
        if servers.is_empty() {
            return Err(DnsError::NoServers);
        }
        Ok(Self {
            cache,
            upstream,
            servers,
            ttl,
        })
    }

    /// All addresses for `host`, in upstream order
    pub async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        if let Some(ip) = parse_ip_literal(host) {
            return Ok(vec![ip]);
        }

        if let Some(ips) = self.cache.get(host).await? {
            tracing::trace!(host, "DNS cache hit");
            return Ok(ips);
        }

        let server = self.pick_server();
        let ips = self.upstream.lookup(server, host).await?;
        tracing::debug!(host, %server, count = ips.len(), "resolved upstream");

        if !ips.is_empty() {
            if let Err(e) = self.cache.set(host, &ips, self.ttl).await {
                tracing::warn!(host, error = %e, "failed to write DNS cache");
            }
        }
        Ok(ips)
    }

    /// One address for `host` chosen by [`select_preferred`]
    pub async fn resolve_with_preference(
        &self,
        host: &str,
        prefer_ipv6: bool,
    ) -> Result<IpAddr, DnsError> {
        let ips = self.resolve(host).await?;
        select_preferred(&ips, prefer_ipv6).ok_or_else(|| DnsError::NoAddresses(host.to_string()))
    }

    fn pick_server(&self) -> SocketAddr {
        let index = rand::thread_rng().gen_range(0..self.servers.len());
        self.servers[index]
    }
}

fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}
