use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Epoch values above this are treated as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y%m%d-%H%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];

/// Build timestamp as advertised by the server or reported by the device.
///
/// The raw text is kept verbatim; ordering only uses the parsed instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BuildDate {
    raw: String,
    instant: Option<DateTime<Utc>>,
}

impl BuildDate {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            instant: parse_instant(raw.trim()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.instant
    }

    /// Strictly later than `other`. Unparseable dates are never later.
    pub fn is_after(&self, other: &BuildDate) -> bool {
        match (self.instant, other.instant) {
            (Some(this), Some(other)) => this > other,
            _ => false,
        }
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        // 8 digits read as YYYYMMDD before falling back to epoch seconds
        if raw.len() == 8 {
            if let Some(date) = parse_date(raw) {
                return Some(date);
            }
        }
        let value: i64 = raw.parse().ok()?;
        return if value > MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(value)
        } else {
            DateTime::from_timestamp(value, 0)
        };
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_time.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(date_time.and_utc());
        }
    }
    parse_date(raw)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date_time| date_time.and_utc())
}

impl From<String> for BuildDate {
    fn from(raw: String) -> Self {
        let instant = parse_instant(raw.trim());
        Self { raw, instant }
    }
}

impl From<BuildDate> for String {
    fn from(date: BuildDate) -> Self {
        date.raw
    }
}

impl fmt::Display for BuildDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
