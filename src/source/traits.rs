use super::row::RowStream;
use super::window::Window;
use crate::storage::watermark::Watermark;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to connect to database: {0}")]
    Connect(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("query returned an unreadable {column}: {message}")]
    Value { column: &'static str, message: String },
}

/// Opens a fresh connection to the transactions table.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError>;
}

/// Read-only access to the `ol_transactions(dt, total, duration)` table.
#[async_trait]
pub trait DataSource: Send {
    /// `max(dt)` over the whole table, `None` when the table is empty.
    async fn max_dt(&mut self) -> Result<Option<Watermark>, SourceError>;

    /// `min(dt)` over the whole table, or over `dt >= since` when given.
    async fn min_dt(&mut self, since: Option<&Watermark>) -> Result<Option<Watermark>, SourceError>;

    /// Rows inside the window, in `dt` order.
    async fn fetch_window(&mut self, window: &Window) -> Result<RowStream, SourceError>;

    async fn close(&mut self) -> Result<(), SourceError>;
}
