//! Timestamp formats and small string helpers.

use chrono::{DateTime, NaiveDateTime};

/// Format the watermark is stored in.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the dashboard's `lastUpdate` field.
pub const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Watermark used when none can be read.
pub fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Formats a timestamp for the watermark blob.
pub fn format_watermark(timestamp: NaiveDateTime) -> String {
    timestamp.format(WATERMARK_FORMAT).to_string()
}

/// Parses a watermark blob. Fractional seconds are accepted.
pub fn parse_watermark(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()
}

/// Parses the remote update time, either an HTTP `Last-Modified` header
/// or the ISO-8601 `lastUpdate` body field. The result is naive UTC.
pub fn parse_remote_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, API_TIMESTAMP_FORMAT))
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.naive_utc()))
        .ok()
}

/// Truncates a string to at most `max_chars` characters with an ellipsis.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        input.to_string()
    } else {
        let kept: String = input.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
