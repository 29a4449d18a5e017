//! The query client: a small trait over the cost-and-usage API, with an AWS implementation and
//! an in-memory one for running the program without an AWS account.

mod aws;
mod test_client;

use crate::model::{CostQuery, RawSnapshot, Region, ResultByTime};
use crate::{Config, Result};
use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;

pub use aws::{AwsCostExplorer, DEFAULT_ENDPOINT, DEFAULT_SIGNING_REGION};
pub use test_client::TestCostExplorer;

/// When this environment variable is set to a non-empty value, the program uses
/// `TestCostExplorer` instead of AWS.
pub const TEST_MODE_ENV: &str = "COST_REPORT_TEST_MODE";

/// Selects which `CostExplorer` implementation is used.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Query AWS Cost Explorer.
    #[default]
    Aws,
    /// Use generated, in-memory data.
    Test,
}

impl Mode {
    /// Returns `Mode::Test` if `COST_REPORT_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Aws`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Aws,
        }
    }
}

/// Issues cost-and-usage queries.
#[async_trait::async_trait]
pub trait CostExplorer {
    /// Returns every time bucket for `query`, restricted to `region` unless it is the pseudo
    /// region `all`. Errors are returned as-is; nothing is retried.
    async fn get_cost_and_usage(
        &mut self,
        region: &Region,
        query: &CostQuery,
    ) -> Result<Vec<ResultByTime>>;
}

/// Creates the `CostExplorer` for `mode`.
pub async fn cost_explorer(config: &Config, mode: Mode) -> Result<Box<dyn CostExplorer + Send>> {
    Ok(match mode {
        Mode::Aws => Box::new(
            AwsCostExplorer::from_env(config.endpoint().clone(), config.signing_region()).await?,
        ),
        Mode::Test => Box::new(TestCostExplorer::default()),
    })
}

/// Queries one region and wraps the result as a `RawSnapshot` captured on `captured`.
pub async fn query_region(
    client: &mut (dyn CostExplorer + Send),
    region: &Region,
    query: &CostQuery,
    captured: NaiveDate,
) -> Result<RawSnapshot> {
    info!(
        "Querying for {} cost by {} for {region}",
        query.granularity.to_string().to_lowercase(),
        query.dimension.to_string().to_lowercase()
    );
    let results_by_time = client
        .get_cost_and_usage(region, query)
        .await
        .with_context(|| format!("Cost query for region {region} failed"))?;
    Ok(RawSnapshot {
        region: region.clone(),
        captured,
        query: query.clone(),
        results_by_time,
    })
}
