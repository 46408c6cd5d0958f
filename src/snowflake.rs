//! Conversions between wall-clock time and Discord snowflake cursors.
//!
//! A snowflake stores milliseconds since the Discord epoch in its upper
//! 42 bits; the low 22 bits hold worker, process and sequence numbers.

use chrono::DateTime;

/// 2015-01-01T00:00:00Z in Unix milliseconds.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

const TIMESTAMP_SHIFT: u32 = 22;

/// Lowest snowflake that could have been minted at `ms`.
/// Times before the Discord epoch map to cursor 0.
pub fn ms_to_cursor(ms: i64) -> i64 {
    ms.saturating_sub(DISCORD_EPOCH_MS)
        .clamp(0, i64::MAX >> TIMESTAMP_SHIFT)
        << TIMESTAMP_SHIFT
}

/// Creation time, in Unix milliseconds, of a snowflake id.
/// Returns `None` when `id` is not numeric.
pub fn cursor_to_ms(id: &str) -> Option<i64> {
    let raw: u64 = id.parse().ok()?;
    Some((raw >> TIMESTAMP_SHIFT) as i64 + DISCORD_EPOCH_MS)
}

/// Parses an ISO-8601 / RFC 3339 timestamp (a trailing `Z` counts as UTC)
/// into Unix milliseconds.
pub fn iso_to_unix_ms(iso: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
