use super::record::{
    MeasurementPayload, MeasurementRecord, TRANSACTION_COUNT_METRIC, TRANSACTION_TIME_METRIC,
};
use crate::config::ApiConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics API returned error status {status}: {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Destination for measurement batches.
///
/// Implementations own authentication, encoding and any retry; a returned
/// error means the batch must be treated as not delivered.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn submit_batch(&self, batch: &[MeasurementRecord]) -> Result<()>;
}

/// Metric definition as the metrics API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub name: String,
    pub display_name: String,
    pub display_name_short: String,
    pub description: String,
    pub default_aggregate: String,
    #[serde(rename = "defaultResolutionMS")]
    pub default_resolution_ms: u64,
    pub unit: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
}

impl MetricDefinition {
    /// The two metrics the pipeline writes to.
    pub fn transaction_metrics() -> Vec<MetricDefinition> {
        vec![
            MetricDefinition {
                name: TRANSACTION_COUNT_METRIC.to_string(),
                display_name: "Online Transaction Count".to_string(),
                display_name_short: "Txn Count".to_string(),
                description: "Number of online transactions".to_string(),
                default_aggregate: "sum".to_string(),
                default_resolution_ms: 1000,
                unit: "number".to_string(),
                metric_type: None,
            },
            MetricDefinition {
                name: TRANSACTION_TIME_METRIC.to_string(),
                display_name: "Online Transaction Time".to_string(),
                display_name_short: "Txn Time".to_string(),
                description: "Duration of online transactions".to_string(),
                default_aggregate: "avg".to_string(),
                default_resolution_ms: 1000,
                unit: "duration".to_string(),
                metric_type: None,
            },
        ]
    }
}

/// HTTP client for the TrueSight Pulse metrics API.
#[derive(Debug)]
pub struct PulseClient {
    base_url: String,
    email: String,
    api_token: String,
    client: reqwest::Client,
}

impl PulseClient {
    pub fn new(config: &ApiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let base_url = if config.host.starts_with("http://") || config.host.starts_with("https://") {
            config.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.host.trim_end_matches('/'))
        };

        Ok(Self {
            base_url,
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.api_token))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Api {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }

    /// Create (or update) a metric definition.
    pub async fn create_metric(&self, metric: &MetricDefinition) -> Result<()> {
        self.post("/v1/metrics", metric).await?;
        tracing::info!(metric = %metric.name, "Created metric definition");
        Ok(())
    }
}

#[async_trait]
impl Delivery for PulseClient {
    async fn submit_batch(&self, batch: &[MeasurementRecord]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let payload: Vec<MeasurementPayload<'_>> = batch.iter().map(MeasurementPayload::from).collect();
        self.post("/v1/measurements", &payload).await?;
        tracing::debug!(count = batch.len(), "Submitted measurement batch");
        Ok(())
    }
}
