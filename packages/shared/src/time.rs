//! Time-related utilities.

use chrono::{DateTime, TimeZone, Utc};

/// Get current Unix timestamp in UTC (milliseconds)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to RFC 3339 format in UTC
///
/// Out-of-range timestamps fall back to the Unix epoch.
pub fn millis_to_rfc3339(timestamp_millis: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or_default();
    dt.to_rfc3339()
}

/// Milliseconds elapsed since `since_millis`, clamped at zero.
pub fn elapsed_millis(since_millis: i64) -> i64 {
    (now_millis() - since_millis).max(0)
}
