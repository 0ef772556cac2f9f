//! Date helper functions

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Parse a timestamp as sent by the content source.
///
/// Accepts RFC 3339 (`2021-03-25T00:00:00Z`) and the compact offset form
/// without a colon (`2021-03-25T19:25:28+0000`).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Format a date in the display timezone using a strftime format string
///
/// # Examples
/// ```ignore
/// format_date(&date, chrono_tz::UTC, "%d %b %Y") // -> "25 Mar 2021"
/// ```
pub fn format_date(date: &DateTime<Utc>, tz: Tz, format: &str) -> String {
    date.with_timezone(&tz).format(format).to_string()
}

/// Format an optional publication date; unknown dates render empty
pub fn format_publication_date(date: Option<&DateTime<Utc>>, tz: Tz, format: &str) -> String {
    date.map(|d| format_date(d, tz, format)).unwrap_or_default()
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
