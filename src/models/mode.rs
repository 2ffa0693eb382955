// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};

/// What the binary does when started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Crawl from the configured seeds and persist pages
    Spider,
    /// Print statistics over the stored records
    Stat,
}

impl Mode {
    /// Check if this mode needs DNS, fetching and the worker pool
    pub fn should_crawl(&self) -> bool {
        matches!(self, Mode::Spider)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "spider" => Ok(Mode::Spider),
            "stat" => Ok(Mode::Stat),
            _ => Err(format!("mode must be 'spider' or 'stat', got: {}", mode)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Spider => write!(f, "spider"),
            Mode::Stat => write!(f, "stat"),
        }
    }
}
