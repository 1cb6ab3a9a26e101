use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::{format_day, DAY_FORMAT};
use crate::metrics::{DayRange, MetricRow};

// ── Metrics ────────────────────────────────────────────────────────

/// Latest stored day, the reconciliation watermark.
pub fn most_recent_day(conn: &Connection) -> Result<Option<NaiveDate>, rusqlite::Error> {
    let max: Option<String> =
        conn.query_row("SELECT MAX(day) FROM copilot_metrics", [], |row| row.get(0))?;
    max.map(|s| parse_day_column(&s, 0)).transpose()
}

/// Insert rows with plain `INSERT`: a day that already exists violates the
/// primary key and fails the call instead of merging. Callers that want
/// all-or-nothing behaviour pass a transaction.
pub fn insert_metrics(conn: &Connection, rows: &[MetricRow]) -> Result<usize, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "INSERT INTO copilot_metrics (
            day, total_suggestions_count, total_acceptances_count,
            total_lines_suggested, total_lines_accepted, total_active_users,
            total_chat_acceptances, total_chat_turns, total_active_chat_users,
            breakdown, ingested_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))",
    )?;
    for row in rows {
        stmt.execute(params![
            format_day(row.day),
            row.total_suggestions_count as i64,
            row.total_acceptances_count as i64,
            row.total_lines_suggested as i64,
            row.total_lines_accepted as i64,
            row.total_active_users as i64,
            row.total_chat_acceptances as i64,
            row.total_chat_turns as i64,
            row.total_active_chat_users as i64,
            row.breakdown,
        ])?;
    }
    Ok(rows.len())
}

/// Rows with `start <= day <= end`, ascending. `breakdown` stays in its
/// at-rest text form.
pub fn metrics_by_period(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<MetricRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT day, total_suggestions_count, total_acceptances_count,
                total_lines_suggested, total_lines_accepted, total_active_users,
                total_chat_acceptances, total_chat_turns, total_active_chat_users,
                breakdown
         FROM copilot_metrics
         WHERE day >= ?1 AND day <= ?2
         ORDER BY day ASC",
    )?;
    let rows = stmt.query_map(params![format_day(start), format_day(end)], metric_row)?;
    rows.collect()
}

pub fn period_range(conn: &Connection) -> Result<Option<DayRange>, rusqlite::Error> {
    let (min, max): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(day), MAX(day) FROM copilot_metrics",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    match (min, max) {
        (Some(min), Some(max)) => Ok(Some(DayRange {
            min: parse_day_column(&min, 0)?,
            max: parse_day_column(&max, 1)?,
        })),
        _ => Ok(None),
    }
}

pub fn count_metrics(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM copilot_metrics", [], |row| row.get(0))
}

fn metric_row(row: &Row<'_>) -> Result<MetricRow, rusqlite::Error> {
    let day: String = row.get(0)?;
    Ok(MetricRow {
        day: parse_day_column(&day, 0)?,
        total_suggestions_count: row.get::<_, i64>(1)? as u64,
        total_acceptances_count: row.get::<_, i64>(2)? as u64,
        total_lines_suggested: row.get::<_, i64>(3)? as u64,
        total_lines_accepted: row.get::<_, i64>(4)? as u64,
        total_active_users: row.get::<_, i64>(5)? as u64,
        total_chat_acceptances: row.get::<_, i64>(6)? as u64,
        total_chat_turns: row.get::<_, i64>(7)? as u64,
        total_active_chat_users: row.get::<_, i64>(8)? as u64,
        breakdown: row.get(9)?,
    })
}

fn parse_day_column(s: &str, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, DAY_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Config key naming the organization whose metrics this store holds.
pub const STORE_ORGANIZATION_KEY: &str = "store_organization";

/// Bind the store to `organization`.
///
/// Returns the organization already bound when it differs and the store
/// holds metrics for it; the binding is left untouched in that case.
pub fn bind_store_organization(
    conn: &Connection,
    organization: &str,
) -> Result<Option<String>, rusqlite::Error> {
    if let Some(bound) = get_config(conn, STORE_ORGANIZATION_KEY)? {
        if !bound.eq_ignore_ascii_case(organization) && count_metrics(conn)? > 0 {
            return Ok(Some(bound));
        }
    }
    set_config(conn, STORE_ORGANIZATION_KEY, organization)?;
    Ok(None)
}

// ── Sync Jobs ──────────────────────────────────────────────────────

pub fn insert_sync_job(conn: &Connection, organization: &str) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO sync_jobs (organization, status, started_at)
         VALUES (?1, 'running', datetime('now'))",
        params![organization],
    )?;
    Ok(conn.last_insert_rowid())
}

#[allow(clippy::too_many_arguments)]
pub fn update_sync_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    fetched_items: u64,
    synced_items: u64,
    chunks_completed: u32,
    chunks_total: u32,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE sync_jobs SET
            status = ?2, completed_at = datetime('now'),
            fetched_items = ?3, synced_items = ?4,
            chunks_completed = ?5, chunks_total = ?6,
            error_message = ?7
         WHERE id = ?1",
        params![
            job_id,
            status,
            fetched_items as i64,
            synced_items as i64,
            chunks_completed,
            chunks_total,
            error_message,
        ],
    )?;
    Ok(())
}

/// Completion time of the most recent sync that finished without error.
pub fn last_completed_sync_at(conn: &Connection) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT MAX(completed_at) FROM sync_jobs WHERE status = 'completed'",
        [],
        |row| row.get(0),
    )
}
