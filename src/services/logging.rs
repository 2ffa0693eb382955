// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Log subscriber setup and redaction of secrets before they are logged.

use crate::models::settings::{DatabaseConfig, LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

/// Hide the password of a connection URL: "redis://:***@cache:6379/"
pub fn redact_url_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("***")).is_err() {
                return "***".to_string();
            }
            url.to_string()
        }
        // Not a URL, could be anything
        Err(_) => "***".to_string(),
    }
}

/// Database target for logs, without the password: "postgres@db:5432/crawler"
pub fn describe_database(config: &DatabaseConfig) -> String {
    format!(
        "{}@{}:{}/{}",
        config.user, config.host, config.port, config.dbname
    )
}
