use super::row::{RawRow, RowStream};
use super::traits::{Connector, DataSource, SourceError};
use super::window::{LowerBound, Window};
use crate::config::DatabaseConfig;
use crate::storage::watermark::Watermark;
use async_trait::async_trait;
use duckdb::Connection;
use std::sync::{Arc, Mutex};

/// Catalog alias the attached MySQL database is mounted under.
const ATTACH_ALIAS: &str = "src";

const MAX_DT_SQL: &str = "SELECT CAST(max(dt) AS VARCHAR) FROM ol_transactions";
const MIN_DT_SQL: &str = "SELECT CAST(min(dt) AS VARCHAR) FROM ol_transactions";
const MIN_DT_SINCE_SQL: &str =
    "SELECT CAST(min(dt) AS VARCHAR) FROM ol_transactions WHERE dt >= CAST(? AS TIMESTAMP)";

impl From<duckdb::Error> for SourceError {
    fn from(e: duckdb::Error) -> Self {
        SourceError::Database(e.to_string())
    }
}

fn window_sql(lower: LowerBound) -> String {
    let op = match lower {
        LowerBound::Inclusive => ">=",
        LowerBound::Exclusive => ">",
    };
    format!(
        "SELECT CAST(dt AS VARCHAR), CAST(total AS VARCHAR), CAST(duration AS VARCHAR)
         FROM ol_transactions
         WHERE dt {op} CAST(? AS TIMESTAMP) AND dt <= CAST(? AS TIMESTAMP)
         ORDER BY dt"
    )
}

/// Quotes a value for use inside a single-quoted SQL string literal.
fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Double-quotes one connection-string value, backslash-escaping `"` and `\`.
fn quote_attach_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// libmysql-style connection string understood by DuckDB's mysql extension.
/// Values are quoted so spaces and `=` survive the key/value split.
fn mysql_attach_string(config: &DatabaseConfig) -> String {
    format!(
        "host={} user={} password={} database={}",
        quote_attach_value(&config.host),
        quote_attach_value(&config.user),
        quote_attach_value(&config.password),
        quote_attach_value(&config.database)
    )
}

/// Connects to MySQL through DuckDB's `mysql` extension, attaching the
/// configured database read-only.
pub struct DuckDbConnector {
    config: DatabaseConfig,
}

impl DuckDbConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for DuckDbConnector {
    async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError> {
        let attach = mysql_attach_string(&self.config);
        let host = self.config.host.clone();
        let database = self.config.database.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open_in_memory()
                .map_err(|e| SourceError::Connect(e.to_string()))?;
            conn.execute_batch("INSTALL mysql; LOAD mysql;")
                .map_err(|e| SourceError::Connect(format!("failed to load mysql extension: {e}")))?;
            conn.execute_batch(&format!(
                "ATTACH '{}' AS {ATTACH_ALIAS} (TYPE mysql, READ_ONLY); USE {ATTACH_ALIAS};",
                quote_literal(&attach)
            ))
            .map_err(|e| SourceError::Connect(e.to_string()))?;
            Ok::<Connection, SourceError>(conn)
        })
        .await
        .map_err(|e| SourceError::Connect(format!("Task join error: {}", e)))??;

        tracing::info!(host = %host, database = %database, "Connected to database");
        Ok(Box::new(DuckDbSource::from_connection(conn)))
    }
}

/// `DataSource` over a DuckDB connection whose default catalog holds
/// `ol_transactions`.
#[derive(Clone)]
pub struct DuckDbSource {
    conn: Option<Arc<Mutex<Connection>>>,
}

impl DuckDbSource {
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Some(Arc::new(Mutex::new(conn))),
        }
    }

    /// Empty in-memory database, mainly for tests and demos.
    pub fn in_memory() -> Result<Self, SourceError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Runs arbitrary statements, e.g. to create and seed a table.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SourceError> {
        let sql = sql.to_string();
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, SourceError>
    where
        F: FnOnce(&Connection) -> Result<T, SourceError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .conn
            .clone()
            .ok_or_else(|| SourceError::Database("connection is closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| SourceError::Database("connection mutex poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| SourceError::Database(format!("Task join error: {}", e)))?
    }

    async fn scalar_dt(
        &self,
        column: &'static str,
        sql: &'static str,
        param: Option<String>,
    ) -> Result<Option<Watermark>, SourceError> {
        let value = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let value: Option<String> = match param {
                    Some(p) => stmt.query_row(duckdb::params![p], |row| row.get(0))?,
                    None => stmt.query_row([], |row| row.get(0))?,
                };
                Ok(value)
            })
            .await?;

        value
            .map(|text| {
                text.parse::<Watermark>().map_err(|e| SourceError::Value {
                    column,
                    message: e.to_string(),
                })
            })
            .transpose()
    }
}

#[async_trait]
impl DataSource for DuckDbSource {
    async fn max_dt(&mut self) -> Result<Option<Watermark>, SourceError> {
        tracing::debug!(sql = MAX_DT_SQL, "Querying max(dt)");
        self.scalar_dt("max(dt)", MAX_DT_SQL, None).await
    }

    async fn min_dt(&mut self, since: Option<&Watermark>) -> Result<Option<Watermark>, SourceError> {
        match since {
            Some(since) => {
                tracing::debug!(sql = MIN_DT_SINCE_SQL, since = %since, "Querying min(dt)");
                self.scalar_dt("min(dt)", MIN_DT_SINCE_SQL, Some(since.to_string()))
                    .await
            }
            None => {
                tracing::debug!(sql = MIN_DT_SQL, "Querying min(dt)");
                self.scalar_dt("min(dt)", MIN_DT_SQL, None).await
            }
        }
    }

    async fn fetch_window(&mut self, window: &Window) -> Result<RowStream, SourceError> {
        let sql = window_sql(window.lower);
        let min_dt = window.min_dt.to_string();
        let max_dt = window.max_dt.to_string();
        tracing::debug!(sql = %sql, min_dt = %min_dt, max_dt = %max_dt, "Querying window");

        let rows = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(duckdb::params![min_dt, max_dt], |row| {
                    Ok(RawRow {
                        dt: row.get(0)?,
                        total: row.get(1)?,
                        duration: row.get(2)?,
                    })
                })?;

                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await?;

        Ok(RowStream::new(rows))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        // Clones made for tests share the handle; the last one closes it.
        if let Ok(mutex) = Arc::try_unwrap(conn) {
            let conn = mutex
                .into_inner()
                .map_err(|_| SourceError::Database("connection mutex poisoned".to_string()))?;
            conn.close().map_err(|(_, e)| SourceError::from(e))?;
        }

        tracing::debug!("Closed database connection");
        Ok(())
    }
}
