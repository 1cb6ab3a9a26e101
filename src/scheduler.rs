//! Daily scheduling of sync cycles for `copilotdw serve`.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::Result;
use crate::sync::{NoopProgress, SyncReport};
use crate::CopilotDW;

/// When and how long a scheduled sync may run. Times are UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub hour: u32,
    pub minute: u32,
    /// A cycle still running after this long is aborted.
    pub timeout: Duration,
    /// Wait after startup before scheduling the first cycle.
    pub initial_delay: Duration,
    /// Upper bound of the random delay added to each run time.
    pub max_jitter: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            hour: 2,
            minute: 0,
            timeout: Duration::from_secs(10 * 60),
            initial_delay: Duration::from_secs(60),
            max_jitter: Duration::from_secs(30),
        }
    }
}

impl Schedule {
    /// First run time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now
            .date_naive()
            .and_hms_opt(self.hour, self.minute, 0)?
            .and_utc();
        if today > now {
            Some(today)
        } else {
            Some(today + chrono::Duration::days(1))
        }
    }
}

/// How a single scheduled cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(SyncReport),
    Failed(String),
    TimedOut,
    Panicked(String),
}

/// Run `cycle` on its own task, aborting it once `timeout` elapses.
pub async fn run_with_timeout<F>(cycle: F, timeout: Duration) -> CycleOutcome
where
    F: Future<Output = Result<SyncReport>> + Send + 'static,
{
    let mut handle = tokio::spawn(cycle);
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(report))) => CycleOutcome::Completed(report),
        Ok(Ok(Err(e))) => CycleOutcome::Failed(e.to_string()),
        Ok(Err(join_err)) => CycleOutcome::Panicked(join_err.to_string()),
        Err(_) => {
            handle.abort();
            CycleOutcome::TimedOut
        }
    }
}

/// Run a sync every day at the scheduled time until `shutdown` resolves.
pub async fn run_scheduled<S>(dw: CopilotDW, schedule: Schedule, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    log::info!(
        "Scheduler started: daily at {:02}:{:02} UTC, first run after {:?}",
        schedule.hour,
        schedule.minute,
        schedule.initial_delay
    );

    tokio::select! {
        _ = &mut shutdown => {
            log::info!("Scheduler stopped before first run");
            return;
        }
        _ = tokio::time::sleep(schedule.initial_delay) => {}
    }

    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_run_after(now) else {
            log::error!(
                "Invalid schedule time {:02}:{:02}; scheduler exiting",
                schedule.hour,
                schedule.minute
            );
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default() + jitter(schedule.max_jitter);
        log::info!("Next sync at {next} (in {}s)", wait.as_secs());

        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let cycle_dw = dw.clone();
        let outcome = run_with_timeout(
            async move { cycle_dw.sync(&NoopProgress).await },
            schedule.timeout,
        )
        .await;

        match outcome {
            CycleOutcome::Completed(report) => log::info!(
                "Scheduled sync {}: {} new of {} fetched",
                report.status_str(),
                report.items_synced,
                report.items_fetched
            ),
            CycleOutcome::Failed(e) => log::error!("Scheduled sync failed: {e}"),
            CycleOutcome::TimedOut => log::error!(
                "Scheduled sync aborted after {:?}; committed chunks are kept",
                schedule.timeout
            ),
            CycleOutcome::Panicked(e) => log::error!("Scheduled sync panicked: {e}"),
        }
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}
