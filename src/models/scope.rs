// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use url::Url;

/// The main domain and all of its subdomains.
///
/// Matching is by whole DNS labels: `blog.site.test` is in scope for
/// `site.test`, `notsite.test` is not. Case and a trailing dot are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    host: String,
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl SiteScope {
    pub fn new(host: &str) -> Self {
        Self {
            host: normalize_host(host),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn contains_host(&self, host: &str) -> bool {
        if self.host.is_empty() {
            return false;
        }
        let host = normalize_host(host);
        host == self.host
            || host
                .strip_suffix(self.host.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    pub fn contains_url(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| self.contains_host(host))
    }

    /// In scope but not the main domain itself
    pub fn is_subdomain(&self, host: &str) -> bool {
        self.contains_host(host) && normalize_host(host) != self.host
    }
}
