use serde::{Deserialize, Serialize};

pub const TRANSACTION_COUNT_METRIC: &str = "ONLINE_TRANSACTION_COUNT";
pub const TRANSACTION_TIME_METRIC: &str = "ONLINE_TRANSACTION_TIME";

/// Properties attached to every measurement. The key set is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub app_id: String,
}

/// One timestamped data point destined for the metrics API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRecord {
    pub metric: &'static str,
    pub source: String,
    pub value: i64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub properties: Properties,
}

/// Wire shape of a measurement in a batch submission.
#[derive(Debug, Serialize)]
pub(crate) struct MeasurementPayload<'a> {
    pub source: &'a str,
    pub metric: &'a str,
    pub measure: i64,
    pub timestamp: i64,
    pub metadata: &'a Properties,
}

impl<'a> From<&'a MeasurementRecord> for MeasurementPayload<'a> {
    fn from(record: &'a MeasurementRecord) -> Self {
        Self {
            source: &record.source,
            metric: record.metric,
            measure: record.value,
            timestamp: record.timestamp,
            metadata: &record.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let record = MeasurementRecord {
            metric: TRANSACTION_COUNT_METRIC,
            source: "littledog.com".to_string(),
            value: 5,
            timestamp: 1459851000,
            properties: Properties {
                app_id: "shop".to_string(),
            },
        };

        let json = serde_json::to_value(MeasurementPayload::from(&record)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "littledog.com",
                "metric": "ONLINE_TRANSACTION_COUNT",
                "measure": 5,
                "timestamp": 1459851000,
                "metadata": {"app_id": "shop"}
            })
        );
    }
}
