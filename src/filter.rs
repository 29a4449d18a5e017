//! Decides which categories are worth plotting by summing each category over the whole table
//! and dropping those below a dollar floor.

use crate::model::{Amount, SpendingTable};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// A category that was left out of the plots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub category: String,
    pub total: Amount,
}

/// The categories to plot and the ones that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub keep: BTreeSet<String>,
    pub skipped: Vec<Skipped>,
}

/// Sums each category over every row of `table`: all dates, metrics and regions, including the
/// pseudo region `all`.
pub fn category_totals(table: &SpendingTable) -> BTreeMap<String, Amount> {
    let mut totals: BTreeMap<String, Amount> = BTreeMap::new();
    for record in table.records() {
        *totals.entry(record.group.clone()).or_default() += record.amount;
    }
    totals
}

/// Keeps the categories whose total is at least `floor`. Each skipped category is logged.
pub fn apply(table: &SpendingTable, floor: Decimal) -> FilterOutcome {
    let floor = Amount::new(floor);
    let mut outcome = FilterOutcome::default();
    for (category, total) in category_totals(table) {
        if total.value() < floor.value() {
            info!("Skipping {category} - total across regions is {total}, below {floor}");
            outcome.skipped.push(Skipped { category, total });
        } else {
            outcome.keep.insert(category);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::aggregate::tests::snapshot;
    use crate::model::record;
    use std::str::FromStr;

    fn five() -> Decimal {
        Decimal::from(5)
    }

    #[test]
    fn test_two_regions_above_floor() {
        let a = snapshot("a", &[("2023-01-01", "svc1", "3")]);
        let b = snapshot("b", &[("2023-01-01", "svc1", "3")]);
        let table = aggregate(&[a, b]);
        assert_eq!(
            category_totals(&table)["svc1"],
            Amount::from_str("6").unwrap()
        );
        let outcome = apply(&table, five());
        assert!(outcome.keep.contains("svc1"));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_two_regions_below_floor() {
        let a = snapshot("a", &[("2023-01-01", "svc2", "1")]);
        let b = snapshot("b", &[("2023-01-01", "svc2", "1")]);
        let outcome = apply(&aggregate(&[a, b]), five());
        assert!(outcome.keep.is_empty());
        assert_eq!(
            outcome.skipped,
            vec![Skipped {
                category: "svc2".to_string(),
                total: Amount::from_str("2").unwrap(),
            }]
        );
    }

    #[test]
    fn test_floor_is_inclusive() {
        let a = snapshot("a", &[("2023-01-01", "svc1", "2.5"), ("2023-01-02", "svc1", "2.5")]);
        let outcome = apply(&aggregate(&[a]), five());
        assert!(outcome.keep.contains("svc1"));
    }

    #[test]
    fn test_negative_amounts_count_against_total() {
        let a = snapshot("a", &[("2023-01-01", "svc1", "10"), ("2023-01-02", "svc1", "-6")]);
        let outcome = apply(&aggregate(&[a]), five());
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn test_total_region_counts_toward_total() {
        let table = SpendingTable::new(vec![
            record("us-east-1", "svc1", "2023-01-01", "3"),
            record("all", "svc1", "2023-01-01", "3"),
        ]);
        assert_eq!(
            category_totals(&table)["svc1"],
            Amount::from_str("6").unwrap()
        );
        let outcome = apply(&table, five());
        assert!(outcome.keep.contains("svc1"));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_total_region_alone_is_counted() {
        let table = SpendingTable::new(vec![record("all", "svc1", "2023-01-01", "7")]);
        assert!(apply(&table, five()).keep.contains("svc1"));
    }
}
