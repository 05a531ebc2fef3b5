use super::StateOverrides;
use crate::config::ApiConfig;
use crate::delivery::PulseClient;
use crate::pipeline::{EtlRunner, RunOutcome};
use crate::source::DuckDbConnector;
use std::path::Path;
use tracing::info;

/// One scheduled invocation. Busy and no-op runs are successes.
pub async fn run(
    config_path: Option<&Path>,
    overrides: &StateOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!(config_path = %path.display(), "Loading settings");
    }
    let config = super::load_config(config_path, overrides)?;
    let api = ApiConfig::from_env()?;

    let client = PulseClient::new(&api, config.delivery.timeout)?;
    let connector = DuckDbConnector::new(config.database.clone());
    let runner = EtlRunner::new(&config, &connector, &client);

    match runner.run().await? {
        RunOutcome::Busy => info!("Another run holds the lock, nothing done"),
        RunOutcome::NoOp => info!("No data to extract, nothing done"),
        RunOutcome::Completed(report) => info!(
            window = %report.window,
            rows = report.rows_read,
            skipped = report.rows_skipped,
            records = report.records_sent,
            batches = report.batches_sent,
            watermark = %report.watermark,
            "Run complete"
        ),
    }

    Ok(())
}
