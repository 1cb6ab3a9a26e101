//! Pure reconciliation: which records of a snapshot are not yet stored.
//!
//! The predicate is day-granular. A day at or before the watermark is
//! treated as already ingested, whatever its content. This holds only while
//! the remote never revises a day after it was first fetched.

use chrono::NaiveDate;

use crate::metrics::Metric;

/// Number of records written per `batch_insert` call.
pub const CHUNK_SIZE: usize = 30;

/// Return the records of `snapshot` that are new relative to `watermark`,
/// sorted ascending by day.
///
/// With no watermark (empty store) every record is new. A day that appears
/// more than once in the snapshot is kept once (first occurrence), since
/// the store admits a single record per day.
pub fn reconcile(mut snapshot: Vec<Metric>, watermark: Option<NaiveDate>) -> Vec<Metric> {
    // Stable sort keeps the first occurrence ahead of later duplicates.
    snapshot.sort_by_key(|m| m.day);

    let before = snapshot.len();
    snapshot.dedup_by_key(|m| m.day);
    if snapshot.len() != before {
        log::warn!(
            "Snapshot contained {} duplicate day(s); keeping the first of each",
            before - snapshot.len()
        );
    }

    match watermark {
        Some(last) => snapshot.into_iter().filter(|m| m.day > last).collect(),
        None => snapshot,
    }
}

/// Number of chunks needed to write `len` records.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}
