// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::db::{StatRow, NOT_FETCHED_STATUS};
use crate::models::scope::SiteScope;
use serde::Serialize;
use std::collections::BTreeSet;

const DOCUMENT_MARKERS: [&str; 3] = [".doc", ".docx", ".pdf"];

/// Summary of everything stored in `crawled_content`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub main_domain: String,
    pub total: usize,
    /// Records whose host is the main domain or one of its subdomains
    pub main_domain_records: usize,
    /// Fetched records that did not answer 200
    pub non_ok: usize,
    pub subdomain_records: usize,
    pub external_records: usize,
    pub unique_external_hosts: usize,
    /// URLs pointing at .doc, .docx or .pdf files
    pub document_links: usize,
    /// Leaf records that were discovered but never fetched
    pub not_fetched: usize,
}

impl StatsReport {
    pub fn from_rows(rows: &[StatRow], main_domain: &str) -> Self {
        let scope = SiteScope::new(main_domain);
        let mut report = StatsReport {
            main_domain: scope.host().to_string(),
            total: rows.len(),
            ..Default::default()
        };
        let mut external_hosts = BTreeSet::new();

        for row in rows {
            if scope.contains_host(&row.domain) {
                report.main_domain_records += 1;
                if scope.is_subdomain(&row.domain) {
                    report.subdomain_records += 1;
                }
            } else {
                report.external_records += 1;
                external_hosts.insert(row.domain.to_ascii_lowercase());
            }

            if row.status == NOT_FETCHED_STATUS {
                report.not_fetched += 1;
            } else if row.status != 200 {
                report.non_ok += 1;
            }

            if DOCUMENT_MARKERS.iter().any(|marker| row.url.contains(marker)) {
                report.document_links += 1;
            }
        }

        report.unique_external_hosts = external_hosts.len();
        report
    }
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Statistics for {}", self.main_domain)?;
        writeln!(f, "  Total records:              {}", self.total)?;
        writeln!(f, "  Main domain records:        {}", self.main_domain_records)?;
        writeln!(f, "  Non-200 pages:              {}", self.non_ok)?;
        writeln!(f, "  Subdomain records:          {}", self.subdomain_records)?;
        writeln!(f, "  External records:           {}", self.external_records)?;
        writeln!(f, "  Unique external hosts:      {}", self.unique_external_hosts)?;
        writeln!(f, "  Document links (doc/pdf):   {}", self.document_links)?;
        write!(f, "  Not fetched (leaf records): {}", self.not_fetched)
    }
}
