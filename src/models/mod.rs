// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod crawler;
pub mod db;
pub mod mode;
pub mod scope;
pub mod settings;
pub mod stats;
