pub mod types;

pub use types::*;

/// Aggregate daily metrics into period totals.
pub fn summarize(metrics: &[Metric]) -> UsageSummary {
    let mut summary = UsageSummary {
        days: metrics.len() as u64,
        ..UsageSummary::default()
    };

    let mut active_user_days: u64 = 0;
    for m in metrics {
        summary.total_suggestions += m.total_suggestions_count;
        summary.total_acceptances += m.total_acceptances_count;
        summary.total_lines_suggested += m.total_lines_suggested;
        summary.total_lines_accepted += m.total_lines_accepted;
        summary.total_chat_turns += m.total_chat_turns;
        summary.total_chat_acceptances += m.total_chat_acceptances;
        summary.peak_active_users = summary.peak_active_users.max(m.total_active_users);
        summary.peak_active_chat_users =
            summary.peak_active_chat_users.max(m.total_active_chat_users);
        active_user_days += m.total_active_users;
    }

    summary.acceptance_rate_pct = pct(summary.total_acceptances, summary.total_suggestions);
    summary.lines_acceptance_rate_pct =
        pct(summary.total_lines_accepted, summary.total_lines_suggested);
    if summary.days > 0 {
        summary.avg_active_users = Some(active_user_days as f64 / summary.days as f64);
    }
    summary
}

fn pct(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::Value;

    fn metric(day: u32, suggestions: u64, acceptances: u64, users: u64) -> Metric {
        Metric {
            day: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            total_suggestions_count: suggestions,
            total_acceptances_count: acceptances,
            total_lines_suggested: suggestions * 2,
            total_lines_accepted: acceptances,
            total_active_users: users,
            total_chat_acceptances: 1,
            total_chat_turns: 3,
            total_active_chat_users: 1,
            breakdown: Value::Null,
        }
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(&[]);
        assert_eq!(s.days, 0);
        assert_eq!(s.acceptance_rate_pct, None);
        assert_eq!(s.avg_active_users, None);
    }

    #[test]
    fn test_summarize_totals_and_rates() {
        let s = summarize(&[metric(1, 100, 25, 4), metric(2, 300, 75, 8)]);
        assert_eq!(s.days, 2);
        assert_eq!(s.total_suggestions, 400);
        assert_eq!(s.total_acceptances, 100);
        assert_eq!(s.total_chat_turns, 6);
        assert_eq!(s.peak_active_users, 8);
        assert_eq!(s.acceptance_rate_pct, Some(25.0));
        assert_eq!(s.lines_acceptance_rate_pct, Some(12.5));
        assert_eq!(s.avg_active_users, Some(6.0));
    }
}
