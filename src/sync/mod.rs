pub mod job;
pub mod reconcile;

use chrono::NaiveDate;
use serde::Serialize;

/// Report returned after a sync cycle completes (successfully or not).
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub organization: String,
    pub status: SyncStatus,
    pub items_fetched: u64,
    pub items_new: u64,
    pub items_synced: u64,
    pub chunks_completed: u32,
    pub chunks_total: u32,
    pub watermark: Option<NaiveDate>,
    pub error: Option<String>,
}

impl SyncReport {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            status: SyncStatus::Success,
            items_fetched: 0,
            items_new: 0,
            items_synced: 0,
            chunks_completed: 0,
            chunks_total: 0,
            watermark: None,
            error: None,
        }
    }

    /// Report for a cycle that was not started because another one held the
    /// sync guard.
    pub fn skipped(organization: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Skipped,
            error: Some("another sync is already running".into()),
            ..Self::new(organization)
        }
    }

    /// Record a failure. Chunks committed before the failure stay committed,
    /// so a cycle that wrote anything is only a partial failure.
    pub fn fail(&mut self, message: String) {
        self.status = if self.chunks_completed > 0 {
            SyncStatus::PartialFailure
        } else {
            SyncStatus::Failed
        };
        self.error = Some(message);
    }

    pub fn status_str(&self) -> &'static str {
        match self.status {
            SyncStatus::Success => "completed",
            SyncStatus::PartialFailure => "partial_failure",
            SyncStatus::Failed => "failed",
            SyncStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Success,
    PartialFailure,
    Failed,
    Skipped,
}

/// Callbacks for observing a sync cycle as it runs.
pub trait SyncProgress: Send + Sync {
    fn on_snapshot_fetched(&self, _organization: &str, _count: usize) {}
    fn on_watermark(&self, _organization: &str, _watermark: Option<NaiveDate>) {}
    fn on_chunk_inserted(&self, _organization: &str, _index: usize, _total: usize, _size: usize) {}
    fn on_complete(&self, _report: &SyncReport) {}
}

/// Progress reporter that ignores all events.
pub struct NoopProgress;

impl SyncProgress for NoopProgress {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_without_writes_is_failed() {
        let mut report = SyncReport::new("octo-org");
        report.fail("boom".into());
        assert_eq!(report.status, SyncStatus::Failed);
        assert_eq!(report.status_str(), "failed");
        assert_eq!(report.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_fail_after_committed_chunk_is_partial() {
        let mut report = SyncReport::new("octo-org");
        report.chunks_total = 3;
        report.chunks_completed = 1;
        report.fail("chunk 2 failed".into());
        assert_eq!(report.status, SyncStatus::PartialFailure);
    }

    #[test]
    fn test_skipped_report() {
        let report = SyncReport::skipped("octo-org");
        assert_eq!(report.status, SyncStatus::Skipped);
        assert_eq!(report.items_synced, 0);
    }
}
