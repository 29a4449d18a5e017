//! Types that represent the core data model: queries, raw snapshots and the spending table.
mod amount;
mod query;
mod snapshot;
mod table;

pub use amount::{Amount, AmountError};
pub use query::{
    default_regions, CostQuery, Dimension, Granularity, Metric, Region, RegionError, TimePeriod,
};
pub use snapshot::{
    normalize_category, DateInterval, Group, MetricValue, RawSnapshot, ResultByTime,
};
pub use table::{SpendingRecord, SpendingTable};

#[cfg(test)]
pub(crate) use table::tests::record;
