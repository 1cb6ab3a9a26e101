pub mod client;
pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod query;
pub mod scheduler;
pub mod storage;
pub mod sync;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

pub use client::{GithubClient, MetricsSource};
pub use config::Settings;
pub use error::{Error, Result};
pub use metrics::{summarize, DayRange, Metric, UsageSummary};
pub use query::period::Period;
pub use query::QueryService;
pub use scheduler::Schedule;
pub use storage::{Database, MetricsStore};
pub use sync::job::SyncJob;
pub use sync::{NoopProgress, SyncProgress, SyncReport, SyncStatus};

use storage::repository;

/// Main entry point for the Copilot metrics warehouse.
#[derive(Clone)]
pub struct CopilotDW {
    db: Database,
    client: GithubClient,
    sync_lock: Arc<Mutex<()>>,
}

/// Snapshot of what the warehouse holds.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseStatus {
    pub organization: Option<String>,
    pub stored_days: i64,
    pub range: Option<DayRange>,
    pub last_sync: Option<String>,
}

impl CopilotDW {
    pub fn new(db: Database, client: GithubClient) -> Self {
        Self {
            db,
            client,
            sync_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_settings(db: Database, settings: &Settings) -> Result<Self> {
        let client = GithubClient::new(&settings.base_url, &settings.organization, &settings.token)?;
        Ok(Self::new(db, client))
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn organization(&self) -> &str {
        self.client.organization()
    }

    /// Run one sync cycle and record it in the job ledger.
    ///
    /// Returns a `Skipped` report when another cycle on this instance is
    /// still running. Errors inside the cycle are reported in the
    /// [`SyncReport`]. This call itself fails only on ledger writes, or with
    /// [`Error::Config`] when the store already holds another
    /// organization's metrics.
    pub async fn sync(&self, progress: &dyn SyncProgress) -> Result<SyncReport> {
        let organization = self.organization().to_string();
        let Ok(_guard) = self.sync_lock.try_lock() else {
            log::warn!("Sync for {organization} already running, skipping");
            let report = SyncReport::skipped(organization);
            progress.on_complete(&report);
            return Ok(report);
        };

        let conflict = self
            .db
            .writer()
            .call({
                let organization = organization.clone();
                move |conn| repository::bind_store_organization(conn, &organization)
            })
            .await?;
        if let Some(bound) = conflict {
            return Err(Error::Config(format!(
                "database holds metrics for organization {bound}, not {organization}; \
                 use a separate --db per organization"
            )));
        }

        let job_id = self
            .db
            .writer()
            .call({
                let organization = organization.clone();
                move |conn| repository::insert_sync_job(conn, &organization)
            })
            .await?;

        let report = SyncJob::new(&organization, &self.client, &self.db)
            .with_progress(progress)
            .run()
            .await;

        self.db
            .writer()
            .call({
                let status = report.status_str();
                let (fetched, synced) = (report.items_fetched, report.items_synced);
                let (done, total) = (report.chunks_completed, report.chunks_total);
                let error = report.error.clone();
                move |conn| {
                    repository::update_sync_job(
                        conn,
                        job_id,
                        status,
                        fetched,
                        synced,
                        done,
                        total,
                        error.as_deref(),
                    )
                }
            })
            .await?;

        Ok(report)
    }

    /// Metrics for every stored day in `[start, end]`.
    pub async fn metrics(&self, start: &str, end: &str) -> Result<Vec<Metric>> {
        QueryService::new(&self.db).get_by_period(start, end).await
    }

    /// Metrics for a named period such as `2024-Q1`, `2024-05` or `30d`.
    pub async fn metrics_for_period(&self, period: &str) -> Result<Vec<Metric>> {
        QueryService::new(&self.db).get_by_named_period(period).await
    }

    pub async fn available_range(&self) -> Result<Option<DayRange>> {
        QueryService::new(&self.db).get_available_range().await
    }

    pub async fn status(&self) -> Result<WarehouseStatus> {
        warehouse_status(&self.db, Some(self.organization())).await
    }
}

/// Collect counts and the last completed sync without needing credentials.
pub async fn warehouse_status(db: &Database, organization: Option<&str>) -> Result<WarehouseStatus> {
    let (stored_days, range, last_sync) = db
        .reader()
        .call(|conn| {
            let count = repository::count_metrics(conn)?;
            let range = repository::period_range(conn)?;
            let last_sync = repository::last_completed_sync_at(conn)?;
            Ok::<_, rusqlite::Error>((count, range, last_sync))
        })
        .await?;

    Ok(WarehouseStatus {
        organization: organization.map(str::to_string),
        stored_days,
        range,
        last_sync,
    })
}
