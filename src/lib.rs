// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod error;
pub mod models;
pub mod services;

// Version is extracted from Cargo.toml at compile time via build.rs
// In CI/CD, the patch version can be overridden via SPIDER_PATCH_VERSION env var
pub const VERSION: &str = env!("SPIDER_VERSION");
