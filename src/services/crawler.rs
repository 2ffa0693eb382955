// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::error::FetchError;
use crate::models::crawler::{FetchRequest, FetchResult};
use async_trait::async_trait;
use std::net::SocketAddr;

const MAX_REDIRECTS: usize = 10;

/// Follow redirects on the pinned host only. A redirect to another host is
/// returned as the 3xx response itself, since the pin does not cover it.
fn same_host_redirects() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        let origin = attempt.previous().first().and_then(|url| url.host_str());
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if attempt.url().host_str() != origin {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

/// Downloads a page with its host pinned to an already resolved address
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Any HTTP response is a result; only transport failures are errors.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, FetchError>;
}

/// Fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    /// The client is built per fetch so the host override applies to this
    /// request only.
    fn client_for(&self, request: &FetchRequest) -> Result<(reqwest::Client, url::Url), FetchError> {
        let url = url::Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let host = url.host_str().ok_or_else(|| FetchError::InvalidUrl {
            url: request.url.clone(),
            reason: "URL has no host".to_string(),
        })?;
        let port = url.port_or_known_default().unwrap_or(80);

        let client = reqwest::Client::builder()
            .resolve(host, SocketAddr::new(request.ip, port))
            .timeout(request.timeout)
            .user_agent(self.user_agent.as_str())
            .redirect(same_host_redirects())
            .build()?;
        Ok((client, url))
    }

    fn map_error(request: &FetchRequest, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: request.url.clone(),
                timeout: request.timeout,
            }
        } else {
            FetchError::Http(e)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, FetchError> {
        let (client, url) = self.client_for(&request)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_error(&request, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let markup = response
            .text()
            .await
            .map_err(|e| Self::map_error(&request, e))?;

        Ok(FetchResult {
            url: final_url,
            markup,
            status,
        })
    }
}
