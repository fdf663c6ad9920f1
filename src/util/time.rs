//! Time and date parsing utilities.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Timestamp layouts the tracker emits besides RFC3339.
///
/// Server dialects omit the colon in the offset (`+0000`), which RFC3339
/// parsing rejects.
const TRACKER_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];

/// Parse a tracker timestamp into a `DateTime<Utc>`.
///
/// Supports:
/// - RFC3339: `2025-01-15T12:00:00Z`, `2025-01-15T12:00:00.000+00:00`
/// - Tracker offsets: `2025-01-15T12:00:00.000+0000`
/// - Naive date-time (assumed UTC): `2025-01-15T12:00:00`
/// - Simple date (midnight UTC): `2025-01-15`
///
/// Returns `None` for anything else; callers treat that as "no timestamp".
#[must_use]
pub fn parse_tracker_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in TRACKER_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render an elapsed duration as a short relative label (`3h ago`).
#[must_use]
pub fn format_age(elapsed: Duration) -> String {
    if elapsed < Duration::zero() {
        return "in the future".to_string();
    }
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = elapsed.num_days();
    if days < 14 {
        return format!("{days}d ago");
    }
    format!("{}w ago", days / 7)
}
