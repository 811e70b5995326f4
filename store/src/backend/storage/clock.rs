//! Timestamp source for every stored row.
//!
//! Timestamps are RFC 3339 UTC strings with millisecond precision and a `Z`
//! suffix. The format is fixed width, so string comparison matches time order
//! in SQL `ORDER BY` as well as in the flat backend's in-memory sorts.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current time, strictly later than any value this process handed out before
pub fn now() -> String {
    format_millis(next_millis(Utc::now().timestamp_millis()))
}

/// Current time, strictly later than `previous` as well
///
/// Used when a row already carries a timestamp that may come from an earlier
/// run with a clock ahead of ours.
pub fn now_after(previous: &str) -> String {
    let current = next_millis(Utc::now().timestamp_millis());
    match parse_millis(previous) {
        Some(prev) if prev >= current => format_millis(prev + 1),
        _ => format_millis(current),
    }
}

/// Parse a stored timestamp into epoch milliseconds
pub fn parse_millis(timestamp: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn next_millis(candidate: i64) -> i64 {
    let mut last = LAST_ISSUED_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = candidate.max(last.saturating_add(1));
        match LAST_ISSUED_MILLIS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
