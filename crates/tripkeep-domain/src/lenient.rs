//! Tolerant readers for fields older clients wrote loosely.
//!
//! Calendar dates arrive as `YYYY-MM-DD` or as full ISO timestamps such as
//! `2024-06-01T00:00:00.000Z`; amounts sometimes arrive as strings. Writes
//! always use the canonical form.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// `YYYY-MM-DD`, an RFC 3339 timestamp (taken as its UTC date) or a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` timestamp.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
        .ok()
        .map(|at| at.date())
}

/// RFC 3339, a naive timestamp read as UTC, or a bare date at UTC midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

pub fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date `{raw}`")))
}

/// Null and blank strings read as no date.
pub fn optional_calendar_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_calendar_date(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date `{raw}`"))),
    }
}

/// Null and blank strings read as the Unix epoch.
pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(DateTime::<Utc>::default()),
        Some(raw) if raw.trim().is_empty() => Ok(DateTime::<Utc>::default()),
        Some(raw) => parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`"))),
    }
}

/// Numbers, numeric strings, or null as zero.
pub fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0.0),
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("amount `{number}` is out of range"))),
        Value::String(text) if text.trim().is_empty() => Ok(0.0),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("invalid amount `{text}`"))),
        other => Err(D::Error::custom(format!("invalid amount `{other}`"))),
    }
}
