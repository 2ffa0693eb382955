// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use std::net::IpAddr;
use std::time::Duration;

/// Request to fetch a specific URL
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// The URL to fetch
    pub url: String,
    /// Address the URL's host is pinned to for this fetch
    pub ip: IpAddr,
    /// Upper bound for the whole fetch
    pub timeout: Duration,
}

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// The URL that served the response, after any redirects
    pub url: String,
    /// The raw markup of the response body
    pub markup: String,
    /// HTTP status code of the response
    pub status: u16,
}

/// What a worker did with one queue item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Stored by an earlier run; nothing else was done
    AlreadyStored,
    /// Fetched and handed to storage
    Fetched {
        /// False when the content hash was already stored or the write failed
        stored: bool,
        /// Links pushed onto the queue
        enqueued: usize,
        /// Off-scope links persisted without fetching
        leaves: usize,
    },
}
