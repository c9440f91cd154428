// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp formatting helpers.
//!
//! All persisted timestamps are ISO-8601 UTC strings so the store stays
//! readable from other languages and from the sqlite shell.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Format epoch milliseconds as an ISO-8601 UTC timestamp.
pub fn iso_from_epoch_ms(ms: u64) -> String {
    let dt = Utc
        .timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO-8601 timestamp back to epoch milliseconds.
pub fn epoch_ms_from_iso(s: &str) -> Option<u64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis().max(0) as u64)
}

/// Elapsed seconds between two ISO-8601 timestamps.
///
/// Returns `None` when either side fails to parse or `end` precedes `start`.
pub fn seconds_between(start: &str, end: &str) -> Option<f64> {
    let start_ms = epoch_ms_from_iso(start)?;
    let end_ms = epoch_ms_from_iso(end)?;
    end_ms.checked_sub(start_ms).map(|d| d as f64 / 1000.0)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
