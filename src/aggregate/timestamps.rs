use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::constants::aggregate::EPOCH_MILLIS_THRESHOLD;

/// Naive layouts read as UTC when no offset is present.
const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Offset-carrying layouts not covered by RFC 3339 (space separator).
const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// UTC calendar date of a record timestamp value.
///
/// Accepts strings (see [`parse_timestamp_str`]) and numeric epoch values.
/// Returns `None` for anything unparseable.
pub fn utc_date_of(value: &Value) -> Option<NaiveDate> {
    let timestamp = match value {
        Value::String(raw) => parse_timestamp_str(raw)?,
        Value::Number(number) => {
            if let Some(raw) = number.as_i64() {
                from_epoch(raw)?
            } else {
                let raw = number
                    .as_f64()
                    .filter(|raw| raw.is_finite() && raw.abs() < i64::MAX as f64)?;
                from_epoch(raw.trunc() as i64)?
            }
        }
        _ => return None,
    };
    Some(timestamp.date_naive())
}

/// Parse an ISO-8601 style timestamp, a plain date, or a numeric epoch string.
///
/// Naive date-times and plain dates are taken as UTC.
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc());
    }
    if trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return trimmed.parse::<i64>().ok().and_then(from_epoch);
    }
    None
}

/// Interpret an epoch value as seconds, or milliseconds when large.
fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    if raw.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD.unsigned_abs() {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}
