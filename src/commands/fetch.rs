use crate::aggregate::aggregate;
use crate::api::{self, Mode};
use crate::args::QueryArgs;
use crate::commands::Out;
use crate::model::{Region, SpendingTable};
use crate::{utils, Config, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// What `fetch` queried and wrote.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub regions: Vec<Region>,
    pub rows: usize,
    pub raw_files: Vec<PathBuf>,
    pub formatted_files: Vec<PathBuf>,
}

/// Queries every configured region, caches each raw snapshot as soon as it arrives, then
/// aggregates the snapshots and caches the formatted table.
pub async fn fetch(mut config: Config, mode: Mode, args: &QueryArgs) -> Result<Out<FetchSummary>> {
    apply_query_args(&mut config, args)?;
    let (summary, _) = fetch_table(&config, mode, utils::today()).await?;
    Ok(Out::new(
        format!(
            "Fetched {} regions into a table of {} rows",
            summary.regions.len(),
            summary.rows
        ),
        summary,
    ))
}

/// Overrides the query settings of `config` with whatever was given on the command line.
pub(super) fn apply_query_args(config: &mut Config, args: &QueryArgs) -> Result<()> {
    if !args.regions().is_empty() {
        config.set_regions(args.regions().to_vec());
    }
    if let Some(days) = args.lookback_days() {
        config.set_lookback_days(days);
    }
    if let Some(granularity) = args.granularity() {
        config.set_granularity(granularity);
    }
    if let Some(dimension) = args.dimension() {
        config.set_dimension(dimension);
    }
    if !args.metrics().is_empty() {
        config.set_metrics(args.metrics().to_vec());
    }
    if args.include_total() {
        config.set_include_total(true);
    }
    config.validate()
}

pub(super) async fn fetch_table(
    config: &Config,
    mode: Mode,
    today: NaiveDate,
) -> Result<(FetchSummary, SpendingTable)> {
    let regions = config.regions_to_query();
    let query = config.query(today);
    debug!("Query: {query:?}");
    let cache = config.cache();
    let mut client = api::cost_explorer(config, mode).await?;

    let mut snapshots = Vec::with_capacity(regions.len());
    let mut raw_files = Vec::new();
    for region in &regions {
        let snapshot = api::query_region(&mut *client, region, &query, today).await?;
        raw_files.extend(cache.save_raw(&snapshot).await?);
        snapshots.push(snapshot);
    }

    let table = aggregate(&snapshots);
    let formatted_files = cache.save_formatted(&table, today).await?;

    let summary = FetchSummary {
        regions,
        rows: table.len(),
        raw_files,
        formatted_files,
    };
    Ok((summary, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metric;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_in_test_mode() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(dir.path()).await.unwrap();
        let args = QueryArgs::default()
            .with_regions(vec![Region::from("us-east-1"), Region::from("us-west-2")])
            .with_lookback_days(3);
        apply_query_args(&mut config, &args).unwrap();
        let today = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();

        let (summary, table) = fetch_table(&config, Mode::Test, today).await.unwrap();

        assert_eq!(summary.regions.len(), 2);
        // 2 regions x 1 metric x 3 days x 4 services
        assert_eq!(summary.rows, 24);
        assert_eq!(table.len(), 24);
        assert_eq!(summary.raw_files.len(), 4);
        assert!(dir.path().join("spending-us-east-1-2023-03-31.json").is_file());
        assert!(dir.path().join("spending-us-west-2-latest.json").is_file());
        assert!(dir.path().join("spending-2023-03-31.csv").is_file());
        assert!(dir.path().join("spending-latest.csv").is_file());
    }

    #[tokio::test]
    async fn test_apply_query_args_keeps_config_when_absent() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(dir.path()).await.unwrap();
        apply_query_args(&mut config, &QueryArgs::default()).unwrap();
        assert_eq!(config.regions().len(), 4);
        assert_eq!(config.metrics(), &[Metric::AmortizedCost]);
        assert_eq!(config.lookback_days(), 90);
    }

    #[tokio::test]
    async fn test_apply_query_args_rejects_zero_lookback() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(dir.path()).await.unwrap();
        let args = QueryArgs::default().with_lookback_days(0);
        assert!(apply_query_args(&mut config, &args).is_err());
    }
}
