pub mod period;

use chrono::NaiveDate;

use crate::date_util::parse_day;
use crate::error::Result;
use crate::metrics::{DayRange, Metric};
use crate::query::period::Period;
use crate::storage::MetricsStore;

/// Read path over a [`MetricsStore`].
///
/// Caller input is validated here, so a malformed range comes back as
/// [`Error::InvalidRange`](crate::Error::InvalidRange) and never reaches
/// the store; store failures come back as
/// [`Error::Database`](crate::Error::Database).
pub struct QueryService<'a> {
    store: &'a dyn MetricsStore,
}

impl<'a> QueryService<'a> {
    pub fn new(store: &'a dyn MetricsStore) -> Self {
        Self { store }
    }

    /// Metrics for every stored day in `[start, end]`, ascending. A range
    /// with `start` after `end` covers no days and yields an empty result.
    pub async fn get_by_period(&self, start: &str, end: &str) -> Result<Vec<Metric>> {
        let (start, end) = validate_range(start, end)?;
        if start > end {
            return Ok(Vec::new());
        }
        self.store.query_by_period(start, end).await
    }

    /// Metrics for a named period such as `2024-Q1` or `28d`.
    pub async fn get_by_named_period(&self, period: &str) -> Result<Vec<Metric>> {
        let (start, end) = Period::parse(period)?.date_range()?;
        self.store.query_by_period(start, end).await
    }

    /// Earliest and latest stored day, or `None` when there is no data.
    pub async fn get_available_range(&self) -> Result<Option<DayRange>> {
        self.store.available_range().await
    }
}

/// Parse both bounds as calendar days. Ordering is not checked.
pub fn validate_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate)> {
    Ok((parse_day(start)?, parse_day(end)?))
}
