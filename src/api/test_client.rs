//! Implements the `CostExplorer` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without an AWS account.

use crate::api::CostExplorer;
use crate::model::{CostQuery, DateInterval, Granularity, Group, MetricValue, Region, ResultByTime};
use crate::Result;
use anyhow::Context;
use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Services and their daily base cost in the generated data. The last one stays well below the
/// default plotting floor so that the skip path is exercised.
const SERVICES: &[(&str, i64)] = &[
    ("Amazon Elastic Compute Cloud - Compute", 42_000),
    ("Amazon Simple Storage Service", 3500),
    ("Amazon Relational Database Service", 17_500),
    ("AWS Key Management Service", 1),
];

/// An implementation of `CostExplorer` that does not call AWS. It either serves fixed results per
/// region or, by default, generates deterministic results for any region and period.
pub struct TestCostExplorer {
    data: Option<HashMap<Region, Vec<ResultByTime>>>,
    calls: Vec<Region>,
}

impl TestCostExplorer {
    /// Create a new `TestCostExplorer` that serves `data`. Regions missing from `data` are an
    /// error.
    pub fn new(data: HashMap<Region, Vec<ResultByTime>>) -> Self {
        Self {
            data: Some(data),
            calls: Vec::new(),
        }
    }

    /// The regions queried so far, in order.
    pub fn calls(&self) -> &[Region] {
        &self.calls
    }
}

impl Default for TestCostExplorer {
    /// Generates data on demand.
    fn default() -> Self {
        Self {
            data: None,
            calls: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl CostExplorer for TestCostExplorer {
    async fn get_cost_and_usage(
        &mut self,
        region: &Region,
        query: &CostQuery,
    ) -> Result<Vec<ResultByTime>> {
        self.calls.push(region.clone());
        match &self.data {
            Some(data) => data
                .get(region)
                .with_context(|| format!("No test data for region '{region}'"))
                .cloned(),
            None => Ok(generate(region, query)),
        }
    }
}

/// A small per-region multiplier so that regions draw distinct lines.
fn region_weight(region: &Region) -> i64 {
    if region.is_total() {
        return 10;
    }
    region.as_str().bytes().map(i64::from).sum::<i64>() % 5 + 1
}

/// Bucket boundaries covering `query.period`. Hourly queries are bucketed by day here.
fn buckets(query: &CostQuery) -> Vec<(NaiveDate, NaiveDate)> {
    let mut out = Vec::new();
    let mut start = query.period.start;
    while start < query.period.end {
        let next = match query.granularity {
            Granularity::Monthly => start
                .with_day(1)
                .and_then(|d| d.checked_add_months(Months::new(1))),
            Granularity::Daily | Granularity::Hourly => start.checked_add_days(Days::new(1)),
        };
        let end = next.unwrap_or(query.period.end).min(query.period.end);
        out.push((start, end));
        start = end;
    }
    out
}

fn generate(region: &Region, query: &CostQuery) -> Vec<ResultByTime> {
    let weight = region_weight(region);
    buckets(query)
        .into_iter()
        .map(|(start, end)| {
            let days = (end - start).num_days().max(1);
            let wobble = i64::from(start.day() % 7) + 7;
            let groups = SERVICES
                .iter()
                .map(|(name, base)| {
                    // base is in thousandths of a cent per day
                    let amount = Decimal::new(base * weight * wobble * days, 5);
                    let metrics: BTreeMap<String, MetricValue> = query
                        .metrics
                        .iter()
                        .map(|metric| {
                            (
                                metric.to_string(),
                                MetricValue {
                                    amount: amount.into(),
                                    unit: "USD".to_string(),
                                },
                            )
                        })
                        .collect();
                    Group {
                        keys: vec![name.to_string()],
                        metrics,
                    }
                })
                .collect();
            ResultByTime {
                time_period: DateInterval {
                    start: start.format("%Y-%m-%d").to_string(),
                    end: end.format("%Y-%m-%d").to_string(),
                },
                total: BTreeMap::new(),
                groups,
                estimated: false,
            }
        })
        .collect()
}
