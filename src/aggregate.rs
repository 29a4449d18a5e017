//! Reshapes per-region raw snapshots into one dense `SpendingTable`.
//!
//! Every region gets one row per (metric, date, category) on shared axes: the dates and
//! categories are the union over all snapshots, and combinations a region did not report are
//! filled with zero rather than dropped. No arithmetic happens across regions.

use crate::model::{Amount, RawSnapshot, SpendingRecord, SpendingTable};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Used when no snapshot reports a unit for a metric at all.
const DEFAULT_UNIT: &str = "USD";

/// The shared row and column labels of the per-region tables.
#[derive(Debug, Default)]
struct Axes {
    /// Bucket start → bucket end.
    dates: BTreeMap<String, String>,
    categories: BTreeSet<String>,
    metrics: BTreeSet<String>,
    /// The first unit seen for each metric in any snapshot.
    units: BTreeMap<String, String>,
}

impl Axes {
    fn new(snapshots: &[RawSnapshot]) -> Self {
        let mut axes = Axes::default();
        for snapshot in snapshots {
            axes.metrics
                .extend(snapshot.query.metrics.iter().map(|m| m.to_string()));
            for bucket in &snapshot.results_by_time {
                axes.dates
                    .entry(bucket.time_period.start.clone())
                    .or_insert_with(|| bucket.time_period.end.clone());
                for group in &bucket.groups {
                    axes.categories.insert(group.category());
                    for (metric, value) in &group.metrics {
                        axes.metrics.insert(metric.clone());
                        axes.units
                            .entry(metric.clone())
                            .or_insert_with(|| value.unit.clone());
                    }
                }
            }
        }
        axes
    }
}

/// Merges one snapshot per region into a single table.
pub fn aggregate(snapshots: &[RawSnapshot]) -> SpendingTable {
    let axes = Axes::new(snapshots);
    debug!(
        "Table axes: {} dates, {} categories, {} metrics",
        axes.dates.len(),
        axes.categories.len(),
        axes.metrics.len()
    );

    let mut records = Vec::new();
    for snapshot in snapshots {
        info!("Adding {} to the spending table", snapshot.region);
        records.extend(region_table(snapshot, &axes));
    }
    SpendingTable::new(records)
}

/// The dense date × category table of one region, for every metric.
fn region_table(snapshot: &RawSnapshot, axes: &Axes) -> Vec<SpendingRecord> {
    // (metric, date, category) → amount. Duplicate keys after normalization are summed.
    let mut cells: BTreeMap<(&str, &str, String), Amount> = BTreeMap::new();
    let mut units: BTreeMap<&str, &str> = BTreeMap::new();
    for bucket in &snapshot.results_by_time {
        for group in &bucket.groups {
            let category = group.category();
            for (metric, value) in &group.metrics {
                *cells
                    .entry((
                        metric.as_str(),
                        bucket.time_period.start.as_str(),
                        category.clone(),
                    ))
                    .or_default() += value.amount;
                units.entry(metric.as_str()).or_insert(value.unit.as_str());
            }
        }
    }

    let mut records =
        Vec::with_capacity(axes.metrics.len() * axes.dates.len() * axes.categories.len());
    for metric in &axes.metrics {
        let unit = units
            .get(metric.as_str())
            .copied()
            .or_else(|| axes.units.get(metric).map(String::as_str))
            .unwrap_or(DEFAULT_UNIT);
        for (start, end) in &axes.dates {
            for category in &axes.categories {
                let amount = cells
                    .get(&(metric.as_str(), start.as_str(), category.clone()))
                    .copied()
                    .unwrap_or_default();
                records.push(SpendingRecord {
                    region: snapshot.region.clone(),
                    group: category.clone(),
                    metric: metric.clone(),
                    amount,
                    unit: unit.to_string(),
                    start_date: start.clone(),
                    end_date: end.clone(),
                });
            }
        }
    }
    records
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{
        CostQuery, DateInterval, Dimension, Granularity, Group, Metric, MetricValue, Region,
        ResultByTime, TimePeriod,
    };
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn next_day(s: &str) -> String {
        (date(s) + chrono::Days::new(1)).format("%Y-%m-%d").to_string()
    }

    /// Builds a snapshot from `(date, service name, amount)` triples, one bucket per date.
    pub(crate) fn snapshot(region: &str, triples: &[(&str, &str, &str)]) -> RawSnapshot {
        let mut buckets: BTreeMap<&str, Vec<Group>> = BTreeMap::new();
        for (day, name, amount) in triples {
            buckets.entry(*day).or_default().push(Group {
                keys: vec![name.to_string()],
                metrics: BTreeMap::from([(
                    "AmortizedCost".to_string(),
                    MetricValue {
                        amount: Amount::from_str(amount).unwrap(),
                        unit: "USD".to_string(),
                    },
                )]),
            });
        }
        let results_by_time = buckets
            .into_iter()
            .map(|(start, groups)| ResultByTime {
                time_period: DateInterval {
                    start: start.to_string(),
                    end: next_day(start),
                },
                total: BTreeMap::new(),
                groups,
                estimated: false,
            })
            .collect();
        RawSnapshot {
            region: Region::from(region),
            captured: date("2023-04-01"),
            query: CostQuery {
                granularity: Granularity::Daily,
                dimension: Dimension::Service,
                metrics: vec![Metric::AmortizedCost],
                period: TimePeriod {
                    start: date("2023-01-01"),
                    end: date("2023-04-01"),
                },
            },
            results_by_time,
        }
    }

    #[test]
    fn test_dense_fill() {
        let a = snapshot(
            "a",
            &[("2023-01-01", "svc1", "3"), ("2023-01-02", "svc2", "4")],
        );
        let b = snapshot("b", &[("2023-01-01", "svc3", "1")]);
        let c = snapshot("c", &[]);
        let table = aggregate(&[a, b, c]);

        // 3 regions × 2 dates × 3 categories, one metric
        assert_eq!(table.len(), 18);
        for region in ["a", "b", "c"] {
            let n = table
                .records()
                .iter()
                .filter(|r| r.region.as_str() == region)
                .count();
            assert_eq!(n, 6);
        }

        let cell = |region: &str, cat: &str, day: &str| {
            table
                .records()
                .iter()
                .find(|r| r.region.as_str() == region && r.group == cat && r.start_date == day)
                .map(|r| r.amount)
                .unwrap()
        };
        assert_eq!(cell("a", "svc1", "2023-01-01"), Amount::from_str("3").unwrap());
        assert!(cell("a", "svc1", "2023-01-02").is_zero());
        assert!(cell("c", "svc2", "2023-01-02").is_zero());
        assert_eq!(cell("b", "svc3", "2023-01-01"), Amount::from_str("1").unwrap());
    }

    #[test]
    fn test_region_order_and_end_dates() {
        let b = snapshot("us-west-2", &[("2023-01-01", "svc1", "1")]);
        let a = snapshot("us-east-1", &[("2023-01-01", "svc1", "2")]);
        let table = aggregate(&[b, a]);
        assert_eq!(
            table.regions(),
            vec![Region::from("us-west-2"), Region::from("us-east-1")]
        );
        assert!(table.records().iter().all(|r| r.end_date == "2023-01-02"));
        assert!(table.records().iter().all(|r| r.unit == "USD"));
    }

    #[test]
    fn test_normalized_collisions_are_summed() {
        let a = snapshot(
            "a",
            &[("2023-01-01", "Amazon S3", "1.5"), ("2023-01-01", "amazon s3", "2.5")],
        );
        let table = aggregate(&[a]);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.records()[0].amount,
            Amount::from_str("4.0").unwrap()
        );
        assert_eq!(table.records()[0].group, "amazon-s3");
    }

    #[test]
    fn test_no_snapshots() {
        assert!(aggregate(&[]).is_empty());
    }
}
