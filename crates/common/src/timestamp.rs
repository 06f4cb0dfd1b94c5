//! Timestamp handling at the record-store boundary.
//!
//! The store emits ISO-8601 strings in several shapes (`T` or space separator,
//! `Z` or numeric offset, sometimes no zone at all). Everything is normalized
//! to `DateTime<Utc>`; zone-less values are taken as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp: {0:?}")]
pub struct ParseTimestampError(pub String);

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// The store's own text form, e.g. `2024-05-01 09:30:00.000Z`. Filters
/// compare as text, so literals must carry the milliseconds too.
const STORE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

pub fn parse(s: &str) -> Result<DateTime<Utc>, ParseTimestampError> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let normalized = trimmed.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|n| n.and_utc())
        .ok_or_else(|| ParseTimestampError(s.to_string()))
}

pub fn format(at: &DateTime<Utc>) -> String {
    at.format(STORE_FORMAT).to_string()
}

/// Wall-clock view of an instant in the configured interpretation offset.
pub fn interpret(at: &DateTime<Utc>, offset: &FixedOffset) -> NaiveDateTime {
    at.with_timezone(offset).naive_local()
}

pub fn parse_offset(s: &str) -> Result<FixedOffset, ParseTimestampError> {
    match s.trim() {
        "" | "Z" | "UTC" => Ok(utc_offset()),
        other => other
            .parse::<FixedOffset>()
            .map_err(|_| ParseTimestampError(s.to_string())),
    }
}

pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}
