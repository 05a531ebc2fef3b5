pub mod client;
pub mod record;

pub use client::{Delivery, DeliveryError, MetricDefinition, PulseClient};
pub use record::{MeasurementRecord, Properties, TRANSACTION_COUNT_METRIC, TRANSACTION_TIME_METRIC};
