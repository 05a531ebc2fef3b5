use super::StateOverrides;
use crate::config::Config;
use crate::pipeline::{plan, transform, Plan};
use crate::source::{Connector, DataSource, DuckDbConnector, RawRow};
use crate::storage::WatermarkStore;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Prints the rows the next run would extract. Delivers nothing and leaves
/// the watermark alone.
pub async fn preview(
    config_path: Option<&Path>,
    overrides: &StateOverrides,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path, overrides)?;
    let connector = DuckDbConnector::new(config.database.clone());
    let mut source = connector.connect().await?;

    print_then_close(&config, source.as_mut(), limit, &mut std::io::stdout().lock()).await
}

/// Prints the window, then closes the source. A close failure is logged so
/// it never hides a failure to print.
async fn print_then_close<W: Write>(
    config: &Config,
    source: &mut dyn DataSource,
    limit: Option<usize>,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = print_window(config, source, limit, out).await;

    if let Err(e) = source.close().await {
        warn!(error = %e, "Failed to close database connection");
    }

    result
}

pub(crate) async fn print_window<W: Write>(
    config: &Config,
    source: &mut dyn DataSource,
    limit: Option<usize>,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let stored = WatermarkStore::new(&config.state.last_record_file).load()?;
    match &stored {
        Some(w) => writeln!(out, "watermark: {w}")?,
        None => writeln!(out, "watermark: unset")?,
    }

    let window = match plan(source, stored.as_ref()).await? {
        Plan::Empty => {
            writeln!(out, "no data to extract")?;
            return Ok(());
        }
        Plan::Window(window) => window,
    };
    writeln!(out, "window: {window}")?;

    let rows = source.fetch_window(&window).await?;
    let total_rows = rows.remaining();
    let shown = limit.unwrap_or(total_rows).min(total_rows);

    writeln!(out, "dt\ttotal\tduration")?;
    for row in rows.take(shown) {
        let note = match transform(&row, &config.app_id, &config.measurement.source) {
            Ok(_) => String::new(),
            Err(e) => format!("\t# skipped: {e}"),
        };
        writeln!(out, "{}{note}", format_row(&row))?;
    }

    if shown < total_rows {
        writeln!(out, "... {} more rows", total_rows - shown)?;
    }
    writeln!(out, "{total_rows} rows")?;
    Ok(())
}

fn format_row(row: &RawRow) -> String {
    let cell = |value: &Option<String>| value.clone().unwrap_or_else(|| "NULL".to_string());
    format!("{}\t{}\t{}", cell(&row.dt), cell(&row.total), cell(&row.duration))
}
