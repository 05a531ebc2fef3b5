use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("failed to parse timestamp '{value}': {source}")]
    ParseError {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp '{0}' is out of range")]
    OutOfRange(String),
}

/// Formats the database renders DATETIME/TIMESTAMP values in, most common first.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a naive database timestamp such as `2016-04-05 10:10:00`.
///
/// Accepts a space or `T` separator and optional fractional seconds.
/// A bare date is taken as midnight.
pub fn parse_db_timestamp(value: &str) -> Result<NaiveDateTime, TimestampError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TimestampError::Empty);
    }

    let mut last_err = None;
    for format in DATETIME_FORMATS {
        match NaiveDateTime::parse_from_str(value, format) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_err = Some(e),
        }
    }

    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| TimestampError::OutOfRange(value.to_string())),
        Err(e) => Err(TimestampError::ParseError {
            value: value.to_string(),
            source: last_err.unwrap_or(e),
        }),
    }
}

/// Renders a timestamp the way the database prints it, keeping sub-second
/// precision only when present.
pub fn format_db_timestamp(dt: &NaiveDateTime) -> String {
    if dt.and_utc().timestamp_subsec_nanos() == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// Seconds since the Unix epoch, interpreting the naive timestamp as UTC.
pub fn epoch_seconds(dt: &NaiveDateTime) -> i64 {
    Utc.from_utc_datetime(dt).timestamp()
}
