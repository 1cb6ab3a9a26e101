pub mod repository;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};
use crate::metrics::{DayRange, Metric, MetricRow};

/// Durable, day-keyed persistence for usage metrics.
///
/// Implementations own the stored records; callers only ever hold copies.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Maximum stored `day`, or `None` when nothing is stored.
    async fn most_recent_day(&self) -> Result<Option<NaiveDate>>;

    /// Persist `rows` as one unit. Inserting a day that is already stored
    /// is an error; existing rows are never merged or overwritten.
    async fn batch_insert(&self, rows: Vec<MetricRow>) -> Result<()>;

    /// Records with `start <= day <= end`, ascending by day, with
    /// `breakdown` materialized.
    async fn query_by_period(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Metric>>;

    /// Earliest and latest stored day, or `None` when nothing is stored.
    async fn available_range(&self) -> Result<Option<DayRange>>;
}

/// Database wraps two `tokio_rusqlite::Connection` instances (writer + reader)
/// using WAL mode for concurrent access. The writer serializes writes via
/// `tokio_rusqlite`'s internal channel; the reader can proceed without blocking.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at the default path (`~/.copilotdw/copilotdw.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".copilotdw");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("copilotdw.db")).await
    }

    /// Open the database at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_reader(&reader).await?;

        Ok(Self { writer, reader })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;

        // For in-memory, we share the same connection for reader/writer
        // since in-memory DBs are per-connection.
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations = Migrations::new(vec![M::up(include_str!(
                "migrations/001_initial.sql"
            ))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reference to the reader connection.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}

#[async_trait]
impl MetricsStore for Database {
    async fn most_recent_day(&self) -> Result<Option<NaiveDate>> {
        Ok(self.reader.call(|conn| repository::most_recent_day(conn)).await?)
    }

    async fn batch_insert(&self, rows: Vec<MetricRow>) -> Result<()> {
        self.writer
            .call(move |conn| {
                let tx = conn.transaction()?;
                repository::insert_metrics(&tx, &rows)?;
                tx.commit()?;
                Ok::<(), rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn query_by_period(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Metric>> {
        let rows = self
            .reader
            .call(move |conn| repository::metrics_by_period(conn, start, end))
            .await?;
        rows.into_iter()
            .map(|row| {
                let day = row.day;
                row.into_metric().map_err(|e| {
                    Error::Database(format!("stored breakdown for {day} is unreadable: {e}"))
                })
            })
            .collect()
    }

    async fn available_range(&self) -> Result<Option<DayRange>> {
        Ok(self.reader.call(|conn| repository::period_range(conn)).await?)
    }
}
