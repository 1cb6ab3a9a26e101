use crate::client::MetricsSource;
use crate::error::Result;
use crate::metrics::MetricRow;
use crate::storage::MetricsStore;
use crate::sync::reconcile::{chunk_count, reconcile, CHUNK_SIZE};
use crate::sync::{NoopProgress, SyncProgress, SyncReport};

/// One reconciliation cycle: fetch the snapshot, keep the days after the
/// store's watermark, write them in sequential chunks.
///
/// A job borrows its collaborators and holds no state between cycles, so a
/// fresh one is built for every scheduled tick.
pub struct SyncJob<'a> {
    organization: &'a str,
    source: &'a dyn MetricsSource,
    store: &'a dyn MetricsStore,
    progress: &'a dyn SyncProgress,
    chunk_size: usize,
}

impl<'a> SyncJob<'a> {
    pub fn new(
        organization: &'a str,
        source: &'a dyn MetricsSource,
        store: &'a dyn MetricsStore,
    ) -> Self {
        Self {
            organization,
            source,
            store,
            progress: &NoopProgress,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn SyncProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run the cycle. Never fails: any error is logged and recorded in the
    /// returned report, and the next cycle starts from whatever was committed.
    pub async fn run(self) -> SyncReport {
        let mut report = SyncReport::new(self.organization);
        log::info!("Starting Copilot metrics sync for {}", self.organization);

        if let Err(e) = self.execute(&mut report).await {
            log::error!(
                "Copilot metrics sync for {} failed after {}/{} chunks: {e}",
                self.organization,
                report.chunks_completed,
                report.chunks_total
            );
            report.fail(e.to_string());
        }

        self.progress.on_complete(&report);
        report
    }

    async fn execute(&self, report: &mut SyncReport) -> Result<()> {
        let snapshot = self.source.fetch_usage_snapshot().await?;
        report.items_fetched = snapshot.len() as u64;
        log::info!("Fetched {} metrics", snapshot.len());
        self.progress.on_snapshot_fetched(self.organization, snapshot.len());

        let watermark = self.store.most_recent_day().await?;
        report.watermark = watermark;
        match watermark {
            Some(day) => log::info!("Found last stored day: {day}"),
            None => log::info!("No stored metrics yet, treating entire snapshot as new"),
        }
        self.progress.on_watermark(self.organization, watermark);

        let rows = reconcile(snapshot, watermark)
            .iter()
            .map(|m| m.to_row())
            .collect::<Result<Vec<MetricRow>>>()?;
        report.items_new = rows.len() as u64;
        log::info!("Found {} new metrics to insert", rows.len());

        if rows.is_empty() {
            log::info!("No new metrics found to insert");
            return Ok(());
        }

        let total = chunk_count(rows.len(), self.chunk_size);
        report.chunks_total = total as u32;
        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            log::debug!("Inserting chunk {}/{total} of size {}", i + 1, chunk.len());
            self.store.batch_insert(chunk.to_vec()).await?;
            report.chunks_completed += 1;
            report.items_synced += chunk.len() as u64;
            self.progress
                .on_chunk_inserted(self.organization, i + 1, total, chunk.len());
        }

        log::info!(
            "Inserted {} new metrics in {total} chunk(s)",
            report.items_synced
        );
        Ok(())
    }
}
