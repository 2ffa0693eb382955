// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::error::StorageError;
use crate::models::stats::StatsReport;
use crate::services::db::Storage;

/// Load every stored record and summarize it relative to `main_domain`
pub async fn build_report(storage: &dyn Storage, main_domain: &str) -> Result<StatsReport, StorageError> {
    let rows = storage.get_all().await?;
    tracing::debug!(rows = rows.len(), "loaded records for statistics");
    Ok(StatsReport::from_rows(&rows, main_domain))
}
