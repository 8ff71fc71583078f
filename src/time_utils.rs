// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Utc};

/// Format the moment a record was ingested, e.g. `2026-10-18 09:00:00.123456`.
pub fn format_ingestion_timestamp(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Format a timestamp for the `x-ms-date` header (RFC 1123, always GMT).
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
