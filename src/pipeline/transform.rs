use crate::delivery::{MeasurementRecord, Properties, TRANSACTION_COUNT_METRIC, TRANSACTION_TIME_METRIC};
use crate::source::timestamp::{epoch_seconds, parse_db_timestamp};
use crate::source::RawRow;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed row: {column} {reason}")]
pub struct MalformedRow {
    pub column: &'static str,
    pub reason: String,
}

impl MalformedRow {
    fn new(column: &'static str, reason: impl Into<String>) -> Self {
        Self {
            column,
            reason: reason.into(),
        }
    }
}

fn required<'a>(column: &'static str, value: &'a Option<String>) -> Result<&'a str, MalformedRow> {
    value
        .as_deref()
        .ok_or_else(|| MalformedRow::new(column, "is NULL"))
}

/// Integer text, or decimal text truncated toward zero.
fn parse_integer(column: &'static str, value: &str) -> Result<i64, MalformedRow> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }

    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 => {
            Ok(f.trunc() as i64)
        }
        _ => Err(MalformedRow::new(column, format!("'{value}' is not a number"))),
    }
}

/// Turns one transactions row into its count and time measurements.
pub fn transform(
    row: &RawRow,
    app_id: &str,
    source_id: &str,
) -> Result<[MeasurementRecord; 2], MalformedRow> {
    let dt_text = required("dt", &row.dt)?;
    let dt = parse_db_timestamp(dt_text).map_err(|e| MalformedRow::new("dt", e.to_string()))?;
    let timestamp = epoch_seconds(&dt);
    let total = parse_integer("total", required("total", &row.total)?)?;
    let duration = parse_integer("duration", required("duration", &row.duration)?)?;

    let properties = Properties {
        app_id: app_id.to_string(),
    };

    Ok([
        MeasurementRecord {
            metric: TRANSACTION_COUNT_METRIC,
            source: source_id.to_string(),
            value: total,
            timestamp,
            properties: properties.clone(),
        },
        MeasurementRecord {
            metric: TRANSACTION_TIME_METRIC,
            source: source_id.to_string(),
            value: duration,
            timestamp,
            properties,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_becomes_count_and_time() {
        let row = RawRow::new("2016-04-05 10:00:00", "5", "100");
        let [count, time] = transform(&row, "shop", "littledog.com").unwrap();

        assert_eq!(count.metric, TRANSACTION_COUNT_METRIC);
        assert_eq!(count.value, 5);
        assert_eq!(time.metric, TRANSACTION_TIME_METRIC);
        assert_eq!(time.value, 100);

        assert_eq!(count.timestamp, 1459850400);
        assert_eq!(count.timestamp, time.timestamp);
        assert_eq!(count.source, "littledog.com");
        assert_eq!(count.properties, time.properties);
        assert_eq!(count.properties.app_id, "shop");
    }

    #[test]
    fn test_decimal_values_truncate() {
        let row = RawRow::new("2016-04-05 10:00:00", "5.00", "99.9");
        let [count, time] = transform(&row, "shop", "src").unwrap();
        assert_eq!(count.value, 5);
        assert_eq!(time.value, 99);

        let row = RawRow::new("2016-04-05 10:00:00", "-2.7", "0");
        let [count, _] = transform(&row, "shop", "src").unwrap();
        assert_eq!(count.value, -2);
    }

    #[test]
    fn test_non_numeric_total() {
        let row = RawRow::new("2016-04-05 10:00:00", "lots", "100");
        let err = transform(&row, "shop", "src").unwrap_err();
        assert_eq!(err.column, "total");
    }

    #[test]
    fn test_infinite_duration_rejected() {
        let row = RawRow::new("2016-04-05 10:00:00", "1", "inf");
        assert_eq!(transform(&row, "shop", "src").unwrap_err().column, "duration");
    }

    #[test]
    fn test_null_cells() {
        let mut row = RawRow::new("2016-04-05 10:00:00", "1", "2");
        row.duration = None;
        let err = transform(&row, "shop", "src").unwrap_err();
        assert_eq!(err, MalformedRow::new("duration", "is NULL"));

        row.dt = None;
        assert_eq!(transform(&row, "shop", "src").unwrap_err().column, "dt");
    }

    #[test]
    fn test_unparseable_timestamp() {
        let row = RawRow::new("last tuesday", "1", "2");
        assert_eq!(transform(&row, "shop", "src").unwrap_err().column, "dt");
    }

    #[test]
    fn test_deterministic() {
        let row = RawRow::new("2016-04-05 10:05:00", "7", "200");
        assert_eq!(
            transform(&row, "shop", "src").unwrap(),
            transform(&row, "shop", "src").unwrap()
        );
    }
}
