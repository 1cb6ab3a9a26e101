use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::date_util::{last_day_of_month, quarter_of};
use crate::error::{Error, Result};

static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,4})[dD]$").unwrap());

/// A named span of days, resolved to an inclusive date range for queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
    /// Last N days ending on (and including) the given day.
    Rolling(u32, NaiveDate),
    YearToDate(NaiveDate),
    QuarterToDate(NaiveDate),
    MonthToDate(NaiveDate),
}

impl Period {
    /// Parse a period string relative to today.
    ///
    /// Supported formats: `2025`, `2025-Q1`, `2025-01`, `2025-W05`, `28d`,
    /// `ytd`, `qtd`, `mtd`.
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_as_of(s, chrono::Utc::now().date_naive())
    }

    pub fn parse_as_of(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "ytd" => return Ok(Period::YearToDate(today)),
            "qtd" => return Ok(Period::QuarterToDate(today)),
            "mtd" => return Ok(Period::MonthToDate(today)),
            _ => {}
        }

        if let Some(caps) = RE_ROLLING.captures(s) {
            let n: u32 = caps[1]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid day count: {s}")))?;
            if n == 0 {
                return Err(Error::PeriodParse("rolling period needs at least 1 day".into()));
            }
            return Ok(Period::Rolling(n, today));
        }

        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            return Ok(Period::Quarter(parse_year(&caps[1])?, caps[2].parse().unwrap_or(1)));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let week: u8 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[1])?;
            if NaiveDate::from_isoywd_opt(year, week as u32, Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let month: u8 = caps[2].parse().unwrap_or(0);
            if (1..=12).contains(&month) {
                return Ok(Period::Month(parse_year(&caps[1])?, month));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Inclusive `(start, end)` for this period.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let invalid = || Error::PeriodParse(format!("period out of range: {self:?}"));
        let ymd = |y: i32, m: u32, d: u32| NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid);

        match self {
            Period::Year(y) => Ok((ymd(*y, 1, 1)?, ymd(*y, 12, 31)?)),
            Period::Quarter(y, q) => {
                let start_month = (*q as u32 - 1) * 3 + 1;
                let end = last_day_of_month(*y, *q as u32 * 3).ok_or_else(invalid)?;
                Ok((ymd(*y, start_month, 1)?, end))
            }
            Period::Month(y, m) => {
                let end = last_day_of_month(*y, *m as u32).ok_or_else(invalid)?;
                Ok((ymd(*y, *m as u32, 1)?, end))
            }
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, *w as u32, Weekday::Mon)
                    .ok_or_else(invalid)?;
                Ok((start, start + Duration::days(6)))
            }
            Period::Rolling(n, as_of) => Ok((*as_of - Duration::days(*n as i64 - 1), *as_of)),
            Period::YearToDate(today) => Ok((ymd(today.year(), 1, 1)?, *today)),
            Period::QuarterToDate(today) => {
                let start_month = (quarter_of(*today) as u32 - 1) * 3 + 1;
                Ok((ymd(today.year(), start_month, 1)?, *today))
            }
            Period::MonthToDate(today) => Ok((ymd(today.year(), today.month(), 1)?, *today)),
        }
    }
}

fn parse_year(s: &str) -> Result<i32> {
    s.parse()
        .map_err(|_| Error::PeriodParse(format!("invalid year: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_calendar_periods() {
        let today = d(2024, 5, 15);
        assert_eq!(Period::parse_as_of("2024", today).unwrap(), Period::Year(2024));
        assert_eq!(Period::parse_as_of("2024-Q2", today).unwrap(), Period::Quarter(2024, 2));
        assert_eq!(Period::parse_as_of("2024-03", today).unwrap(), Period::Month(2024, 3));
        assert_eq!(Period::parse_as_of("2024-W05", today).unwrap(), Period::Week(2024, 5));
        assert_eq!(Period::parse_as_of("2024-W1", today).unwrap(), Period::Week(2024, 1));
    }

    #[test]
    fn test_parse_relative_periods() {
        let today = d(2024, 5, 15);
        assert_eq!(Period::parse_as_of("28d", today).unwrap(), Period::Rolling(28, today));
        assert_eq!(Period::parse_as_of("YTD", today).unwrap(), Period::YearToDate(today));
        assert_eq!(Period::parse_as_of("qtd", today).unwrap(), Period::QuarterToDate(today));
        assert_eq!(Period::parse_as_of("mtd", today).unwrap(), Period::MonthToDate(today));
    }

    #[test]
    fn test_parse_invalid() {
        let today = d(2024, 5, 15);
        for bad in ["garbage", "2024-Q5", "2024-13", "2024-W60", "0d", ""] {
            assert!(
                matches!(Period::parse_as_of(bad, today), Err(Error::PeriodParse(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_date_ranges() {
        assert_eq!(
            Period::Quarter(2024, 1).date_range().unwrap(),
            (d(2024, 1, 1), d(2024, 3, 31))
        );
        assert_eq!(
            Period::Month(2024, 2).date_range().unwrap(),
            (d(2024, 2, 1), d(2024, 2, 29))
        );
        assert_eq!(
            Period::Rolling(28, d(2024, 1, 28)).date_range().unwrap(),
            (d(2024, 1, 1), d(2024, 1, 28))
        );
        assert_eq!(
            Period::QuarterToDate(d(2024, 5, 15)).date_range().unwrap(),
            (d(2024, 4, 1), d(2024, 5, 15))
        );

        let (s, e) = Period::Week(2024, 1).date_range().unwrap();
        assert_eq!(s.weekday(), Weekday::Mon);
        assert_eq!((e - s).num_days(), 6);
    }
}
