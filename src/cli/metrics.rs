use crate::config::{ApiConfig, DeliverySettings};
use crate::delivery::{MetricDefinition, PulseClient};

/// Defines the metrics the pipeline writes to, so measurements have somewhere to land.
pub async fn create() -> Result<(), Box<dyn std::error::Error>> {
    let api = ApiConfig::from_env()?;
    let client = PulseClient::new(&api, DeliverySettings::default().timeout)?;

    for metric in MetricDefinition::transaction_metrics() {
        client.create_metric(&metric).await?;
        println!("{}", metric.name);
    }

    Ok(())
}
