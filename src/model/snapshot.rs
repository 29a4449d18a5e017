//! The raw, as-returned shape of a cost-and-usage response, captured per region.

use crate::model::{Amount, CostQuery, Region};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One capture of the API's `ResultsByTime` for a single region. Snapshots are written to the
/// cache once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RawSnapshot {
    /// The region the query was filtered to.
    pub region: Region,
    /// The local date on which the query was made.
    pub captured: NaiveDate,
    /// The query that produced `results_by_time`.
    pub query: CostQuery,
    /// The API response, verbatim.
    pub results_by_time: Vec<ResultByTime>,
}

/// One time bucket of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: DateInterval,
    /// Ungrouped totals. The API leaves this empty when a `GroupBy` is requested.
    #[serde(default)]
    pub total: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub estimated: bool,
}

/// The bucket boundaries. These are kept as strings because hourly buckets are timestamps while
/// daily and monthly buckets are dates.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: String,
    pub end: String,
}

/// The amounts for one group (e.g. one service) within a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    pub keys: Vec<String>,
    /// Keyed by metric name, e.g. `AmortizedCost`.
    pub metrics: BTreeMap<String, MetricValue>,
}

impl Group {
    /// The category name used throughout the tables and charts: keys joined with `_`, spaces
    /// replaced by `-`, lowercased.
    pub fn category(&self) -> String {
        normalize_category(&self.keys)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: Amount,
    pub unit: String,
}

/// e.g. `["Amazon Simple Storage Service"]` becomes `amazon-simple-storage-service`.
pub fn normalize_category(keys: &[String]) -> String {
    keys.join("_").replace(' ', "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const RESPONSE: &str = r#"[
        {
            "TimePeriod": {"Start": "2023-01-01", "End": "2023-01-02"},
            "Total": {},
            "Groups": [
                {
                    "Keys": ["Amazon Elastic Compute Cloud - Compute"],
                    "Metrics": {"AmortizedCost": {"Amount": "12.3456", "Unit": "USD"}}
                }
            ],
            "Estimated": true
        },
        {
            "TimePeriod": {"Start": "2023-01-02", "End": "2023-01-03"}
        }
    ]"#;

    #[test]
    fn test_parse_api_results() {
        let results: Vec<ResultByTime> = serde_json::from_str(RESPONSE).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].estimated);
        let group = &results[0].groups[0];
        assert_eq!(group.category(), "amazon-elastic-compute-cloud---compute");
        assert_eq!(
            group.metrics["AmortizedCost"].amount,
            Amount::from_str("12.3456").unwrap()
        );
        assert!(results[1].groups.is_empty());
    }

    #[test]
    fn test_normalize_multiple_keys() {
        let keys = vec!["Amazon S3".to_string(), "USW2-Requests Tier1".to_string()];
        assert_eq!(normalize_category(&keys), "amazon-s3_usw2-requests-tier1");
    }
}
