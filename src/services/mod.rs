// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod controller;
pub mod crawler;
pub mod db;
pub mod dns_cache;
pub mod dns_resolver;
pub mod frontier;
pub mod links;
pub mod logging;
pub mod queue;
pub mod stats;
pub mod test_dependencies;
pub mod worker;
