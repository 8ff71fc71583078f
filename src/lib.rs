// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Club-Activity-Sync: keep a running record of a Strava club's activities
//!
//! Every hour the job refreshes an OAuth token, pulls the club activity
//! feed, merges new entries into the stored collection, and writes the
//! result back to Azure Blob Storage.

pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod time_utils;
