//! Timestamp utilities
//!
//! Readings are bucketed by calendar month in UTC. The month key is
//! persisted alongside each measure so the database can enforce one
//! reading per customer, meter type and month.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// Calendar month (UTC) a measure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeasureMonth {
    pub year: i32,
    pub month: u32,
}

impl MeasureMonth {
    pub fn of(datetime: &DateTime<Utc>) -> Self {
        Self {
            year: datetime.year(),
            month: datetime.month(),
        }
    }

    /// Month key as stored in the `measure_month` column
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MeasureMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parse a client-supplied measure timestamp.
///
/// Accepts RFC 3339 (`2024-08-29T10:00:00-03:00`), a naive datetime taken
/// as UTC (`2024-08-29T10:00:00`, fractional seconds allowed) and a bare
/// date taken as midnight UTC (`2024-08-29`).
pub fn parse_measure_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
