// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use dashmap::DashSet;

/// URLs already scheduled during the current run.
///
/// Membership only grows. A URL is handed out at most once per run.
#[derive(Debug, Default)]
pub struct Frontier {
    urls: DashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `url` and report whether it was new.
    ///
    /// Check and insert happen under one shard lock, so of several
    /// concurrent callers with the same URL exactly one sees `true`.
    pub fn add_if_absent(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
