use chrono::{DateTime, Datelike, Duration, NaiveDate};

use crate::error::{Error, Result};

/// At-rest and wire format for a metric day.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next.map(|d| d - Duration::days(1))
}

/// Get the quarter (1-4) for a given date.
pub fn quarter_of(d: NaiveDate) -> u8 {
    ((d.month() - 1) / 3 + 1) as u8
}

pub fn format_day(d: NaiveDate) -> String {
    d.format(DAY_FORMAT).to_string()
}

/// Parse a caller-supplied day. Accepts `YYYY-MM-DD` or an RFC 3339
/// timestamp, in which case the calendar date of the timestamp is used.
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, DAY_FORMAT) {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .map_err(|_| Error::InvalidRange(format!("not a calendar date: {s:?}")))
}
