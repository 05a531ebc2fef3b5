use crate::source::{DataSource, LowerBound, SourceError, Window};
use crate::storage::watermark::Watermark;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Nothing to extract; the run is a no-op.
    Empty,
    Window(Window),
}

/// Works out which slice of the table this run extracts.
///
/// `max_dt` is the table maximum right now. `min_dt` is the table minimum on
/// the first run, otherwise `min(dt)` over `dt >= stored`. The probe is
/// inclusive while the extraction predicate is exclusive, so on later runs
/// `min_dt` normally equals the watermark row itself and that row is not
/// extracted again.
pub async fn plan(
    source: &mut dyn DataSource,
    stored: Option<&Watermark>,
) -> Result<Plan, SourceError> {
    let Some(max_dt) = source.max_dt().await? else {
        tracing::debug!("Table is empty");
        return Ok(Plan::Empty);
    };

    let Some(min_dt) = source.min_dt(stored).await? else {
        tracing::debug!(max_dt = %max_dt, "No rows at or after the watermark");
        return Ok(Plan::Empty);
    };

    if min_dt > max_dt {
        // Rows landed between the two probes; leave them for the next run.
        tracing::debug!(min_dt = %min_dt, max_dt = %max_dt, "Window is inverted, skipping");
        return Ok(Plan::Empty);
    }

    let lower = match stored {
        None => LowerBound::Inclusive,
        Some(_) => LowerBound::Exclusive,
    };

    Ok(Plan::Window(Window {
        min_dt,
        max_dt,
        lower,
    }))
}
