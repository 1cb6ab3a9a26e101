use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One day of organization-wide Copilot usage, as returned by
/// `GET /orgs/{org}/copilot/usage` and as materialized on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub day: NaiveDate,
    #[serde(default)]
    pub total_suggestions_count: u64,
    #[serde(default)]
    pub total_acceptances_count: u64,
    #[serde(default)]
    pub total_lines_suggested: u64,
    #[serde(default)]
    pub total_lines_accepted: u64,
    #[serde(default)]
    pub total_active_users: u64,
    #[serde(default)]
    pub total_chat_acceptances: u64,
    #[serde(default)]
    pub total_chat_turns: u64,
    #[serde(default)]
    pub total_active_chat_users: u64,
    /// Per language/editor detail. Opaque to reconciliation.
    #[serde(default)]
    pub breakdown: Value,
}

/// At-rest form of a [`Metric`]: identical scalars, with `breakdown`
/// serialized to JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub day: NaiveDate,
    pub total_suggestions_count: u64,
    pub total_acceptances_count: u64,
    pub total_lines_suggested: u64,
    pub total_lines_accepted: u64,
    pub total_active_users: u64,
    pub total_chat_acceptances: u64,
    pub total_chat_turns: u64,
    pub total_active_chat_users: u64,
    pub breakdown: String,
}

impl Metric {
    pub fn to_row(&self) -> Result<MetricRow> {
        Ok(MetricRow {
            day: self.day,
            total_suggestions_count: self.total_suggestions_count,
            total_acceptances_count: self.total_acceptances_count,
            total_lines_suggested: self.total_lines_suggested,
            total_lines_accepted: self.total_lines_accepted,
            total_active_users: self.total_active_users,
            total_chat_acceptances: self.total_chat_acceptances,
            total_chat_turns: self.total_chat_turns,
            total_active_chat_users: self.total_active_chat_users,
            breakdown: encode_breakdown(&self.breakdown)?,
        })
    }
}

impl MetricRow {
    pub fn into_metric(self) -> Result<Metric> {
        Ok(Metric {
            day: self.day,
            total_suggestions_count: self.total_suggestions_count,
            total_acceptances_count: self.total_acceptances_count,
            total_lines_suggested: self.total_lines_suggested,
            total_lines_accepted: self.total_lines_accepted,
            total_active_users: self.total_active_users,
            total_chat_acceptances: self.total_chat_acceptances,
            total_chat_turns: self.total_chat_turns,
            total_active_chat_users: self.total_active_chat_users,
            breakdown: decode_breakdown(&self.breakdown)?,
        })
    }
}

/// Serialize a breakdown for storage. serde_json keeps object keys sorted,
/// so equal values always encode to the same text.
pub fn encode_breakdown(breakdown: &Value) -> Result<String> {
    Ok(serde_json::to_string(breakdown)?)
}

pub fn decode_breakdown(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Inclusive span of stored days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayRange {
    #[serde(rename = "minDate")]
    pub min: NaiveDate,
    #[serde(rename = "maxDate")]
    pub max: NaiveDate,
}

/// Totals over a set of daily metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub days: u64,
    pub total_suggestions: u64,
    pub total_acceptances: u64,
    pub total_lines_suggested: u64,
    pub total_lines_accepted: u64,
    pub total_chat_turns: u64,
    pub total_chat_acceptances: u64,
    /// Acceptances as a percentage of suggestions.
    pub acceptance_rate_pct: Option<f64>,
    /// Accepted lines as a percentage of suggested lines.
    pub lines_acceptance_rate_pct: Option<f64>,
    pub peak_active_users: u64,
    pub avg_active_users: Option<f64>,
    pub peak_active_chat_users: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "day": "2024-06-24",
            "total_suggestions_count": 1000,
            "total_acceptances_count": 800,
            "total_lines_suggested": 1800,
            "total_lines_accepted": 1200,
            "total_active_users": 10,
            "total_chat_acceptances": 32,
            "total_chat_turns": 200,
            "total_active_chat_users": 4,
            "breakdown": [
                {
                    "language": "python",
                    "editor": "vscode",
                    "suggestions_count": 300,
                    "acceptances_count": 250,
                    "lines_suggested": 900,
                    "lines_accepted": 700,
                    "active_users": 5
                },
                {
                    "language": "ruby",
                    "editor": "jetbrains",
                    "suggestions_count": 700,
                    "acceptances_count": 550,
                    "lines_suggested": 900,
                    "lines_accepted": 500,
                    "active_users": 5
                }
            ]
        })
    }

    #[test]
    fn test_deserialize_usage_payload() {
        let metric: Metric = serde_json::from_value(sample_payload()).unwrap();
        assert_eq!(metric.day, NaiveDate::from_ymd_opt(2024, 6, 24).unwrap());
        assert_eq!(metric.total_suggestions_count, 1000);
        assert_eq!(metric.total_active_chat_users, 4);
        assert_eq!(metric.breakdown.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let metric: Metric = serde_json::from_value(json!({ "day": "2024-06-24" })).unwrap();
        assert_eq!(metric.total_chat_turns, 0);
        assert_eq!(metric.breakdown, Value::Null);
    }

    #[test]
    fn test_breakdown_round_trip() {
        let payloads = [
            sample_payload()["breakdown"].clone(),
            json!([]),
            json!(null),
            json!({"nested": {"deep": [1, 2, {"x": "y"}]}, "flag": true}),
            json!([{"language": "unicode ✓", "ratio": 0.25}]),
        ];
        for p in payloads {
            let encoded = encode_breakdown(&p).unwrap();
            assert_eq!(decode_breakdown(&encoded).unwrap(), p);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(encode_breakdown(&a).unwrap(), encode_breakdown(&b).unwrap());
    }

    #[test]
    fn test_row_round_trip_preserves_scalars() {
        let metric: Metric = serde_json::from_value(sample_payload()).unwrap();
        let row = metric.to_row().unwrap();
        assert!(row.breakdown.starts_with('['));
        assert_eq!(row.total_lines_accepted, 1200);
        assert_eq!(row.into_metric().unwrap(), metric);
    }

    #[test]
    fn test_corrupt_breakdown_fails_to_materialize() {
        let metric: Metric = serde_json::from_value(sample_payload()).unwrap();
        let mut row = metric.to_row().unwrap();
        row.breakdown = "{not json".into();
        assert!(row.into_metric().is_err());
    }

    #[test]
    fn test_day_range_serializes_like_period_range_endpoint() {
        let range = DayRange {
            min: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            max: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(range).unwrap(),
            json!({"minDate": "2024-01-01", "maxDate": "2024-01-10"})
        );
    }
}
