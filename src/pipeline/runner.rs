use super::dispatch::{dispatch, DispatchSummary};
use super::planner::{plan, Plan};
use super::transform::transform;
use crate::config::Config;
use crate::delivery::{Delivery, DeliveryError};
use crate::source::{Connector, DataSource, SourceError, Window};
use crate::storage::lock::{LockError, RunLock};
use crate::storage::watermark::{PersistError, Watermark, WatermarkStore};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that fail a run. None of them advance the watermark.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("connection error: {0}")]
    Connection(#[from] SourceError),

    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Where a run is in its protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LockAcquired,
    Connected,
    WindowPlanned,
    Extracted,
    Dispatched,
    WatermarkAdvanced,
    Done,
    AbortedBusy,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub window: Window,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub records_sent: usize,
    pub batches_sent: usize,
    /// Watermark stored at the end of the run.
    pub watermark: Watermark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run holds the lock.
    Busy,
    /// Nothing to extract; the watermark is untouched.
    NoOp,
    Completed(RunReport),
}

struct Tracker {
    state: RunState,
}

impl Tracker {
    fn advance(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
    }
}

/// Runs the incremental extraction: lock, plan, extract, transform,
/// deliver, advance the watermark.
pub struct EtlRunner<'a> {
    connector: &'a dyn Connector,
    delivery: &'a dyn Delivery,
    store: WatermarkStore,
    lock_path: PathBuf,
    app_id: String,
    source_id: String,
    batch_size: usize,
}

impl<'a> EtlRunner<'a> {
    pub fn new(config: &Config, connector: &'a dyn Connector, delivery: &'a dyn Delivery) -> Self {
        Self {
            connector,
            delivery,
            store: WatermarkStore::new(&config.state.last_record_file),
            lock_path: config.state.lock_file.clone(),
            app_id: config.app_id.clone(),
            source_id: config.measurement.source.clone(),
            batch_size: config.delivery.batch_size,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        let mut tracker = Tracker {
            state: RunState::Idle,
        };

        info!(path = %self.lock_path.display(), "Acquiring lock");
        let mut lock = RunLock::open(&self.lock_path)?;
        let _guard = match lock.try_acquire() {
            Ok(guard) => guard,
            Err(LockError::Busy(path)) => {
                tracker.advance(RunState::AbortedBusy);
                info!(path = %path.display(), "Extraction process running, skipping");
                return Ok(RunOutcome::Busy);
            }
            Err(e) => return Err(e.into()),
        };
        tracker.advance(RunState::LockAcquired);

        let result = self.locked(&mut tracker).await;
        match &result {
            Ok(_) => tracker.advance(RunState::Done),
            Err(e) => {
                let reached = tracker.state;
                tracker.advance(RunState::Failed);
                error!(state = ?reached, error = %e, "Run failed");
            }
        }
        result
    }

    /// Everything that happens while the lock is held.
    async fn locked(&self, tracker: &mut Tracker) -> Result<RunOutcome, RunError> {
        let stored = self.store.load()?;
        match &stored {
            Some(w) => info!(watermark = %w, "Resuming from watermark"),
            None => info!("No watermark stored, extracting from the start of the table"),
        }

        let mut source = self.connector.connect().await?;
        tracker.advance(RunState::Connected);

        let result = self.extract_and_deliver(source.as_mut(), stored, tracker).await;

        if let Err(e) = source.close().await {
            warn!(error = %e, "Failed to close database connection");
        }

        result
    }

    async fn extract_and_deliver(
        &self,
        source: &mut dyn DataSource,
        stored: Option<Watermark>,
        tracker: &mut Tracker,
    ) -> Result<RunOutcome, RunError> {
        let window = match plan(source, stored.as_ref()).await? {
            Plan::Empty => {
                info!("No data to extract");
                return Ok(RunOutcome::NoOp);
            }
            Plan::Window(window) => window,
        };
        tracker.advance(RunState::WindowPlanned);
        info!(window = %window, "Computed extraction window");

        let rows = source.fetch_window(&window).await?;
        let rows_read = rows.remaining();
        tracker.advance(RunState::Extracted);
        info!(rows = rows_read, "Extracted rows");

        let mut rows_skipped = 0usize;
        let records = rows
            .filter_map(|row| match transform(&row, &self.app_id, &self.source_id) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!(error = %e, dt = ?row.dt, "Skipping row");
                    rows_skipped += 1;
                    None
                }
            })
            .flatten();

        let DispatchSummary { records, batches } =
            dispatch(records, self.delivery, self.batch_size).await?;
        tracker.advance(RunState::Dispatched);
        info!(records, batches, skipped = rows_skipped, "Delivered measurements");

        let watermark = self.advance_watermark(stored, window.max_dt)?;
        tracker.advance(RunState::WatermarkAdvanced);

        Ok(RunOutcome::Completed(RunReport {
            window,
            rows_read,
            rows_skipped,
            records_sent: records,
            batches_sent: batches,
            watermark,
        }))
    }

    /// Persists `max_dt` unless that would move the watermark backwards.
    fn advance_watermark(
        &self,
        stored: Option<Watermark>,
        max_dt: Watermark,
    ) -> Result<Watermark, PersistError> {
        if let Some(prev) = stored {
            if max_dt < prev {
                warn!(stored = %prev, max_dt = %max_dt, "Refusing to move watermark backwards");
                return Ok(prev);
            }
        }

        self.store.save(&max_dt)?;
        info!(watermark = %max_dt, "Advanced watermark");
        Ok(max_dt)
    }
}
