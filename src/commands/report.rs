use crate::api::Mode;
use crate::args::ReportArgs;
use crate::commands::fetch::{apply_query_args, fetch_table, FetchSummary};
use crate::commands::plot::{apply_output_args, plot_table, PlotSummary};
use crate::commands::Out;
use crate::{utils, Config, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// The combined outcome of a `report` run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub fetch: FetchSummary,
    pub plot: PlotSummary,
}

/// Runs the whole pipeline: query, cache, aggregate, filter and plot.
pub async fn report(
    mut config: Config,
    mode: Mode,
    args: &ReportArgs,
) -> Result<Out<ReportSummary>> {
    apply_query_args(&mut config, args.query())?;
    apply_output_args(&mut config, args.output())?;
    run(&config, mode, args, utils::today()).await
}

async fn run(
    config: &Config,
    mode: Mode,
    args: &ReportArgs,
    today: NaiveDate,
) -> Result<Out<ReportSummary>> {
    let (fetch, table) = fetch_table(config, mode, today).await?;
    let plot = plot_table(&table, config.floor(), args.output().outdir()).await?;
    let message = format!("Fetched {} regions. {}", fetch.regions.len(), plot.message());
    Ok(Out::new(message, ReportSummary { fetch, plot }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{OutputArgs, QueryArgs};
    use crate::model::Region;
    use crate::plot::PDF_NAME;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_report_in_test_mode() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("cache");
        let outdir = dir.path().join("out");
        let mut config = Config::load(&data_dir).await.unwrap();
        let args = ReportArgs::new(
            QueryArgs::default().with_lookback_days(30),
            OutputArgs::new(None, &outdir),
        );
        apply_query_args(&mut config, args.query()).unwrap();
        let today = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();

        let out = run(&config, Mode::Test, &args, today).await.unwrap();

        let summary = out.summary().unwrap();
        assert_eq!(summary.fetch.regions.len(), 4);
        assert_eq!(summary.plot.plotted.len(), 3);
        assert_eq!(summary.plot.skipped[0].category, "aws-key-management-service");
        assert_eq!(summary.plot.pdf.as_deref(), Some(outdir.join(PDF_NAME).as_path()));
        assert!(data_dir.join("spending-latest.csv").is_file());
        assert!(data_dir.join("spending-us-west-1-2023-03-31.json").is_file());
    }

    #[tokio::test]
    async fn test_report_with_total_region() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(dir.path()).await.unwrap();
        config.set_regions(vec![Region::from("us-east-1")]);
        config.set_include_total(true);
        config.set_lookback_days(5);
        let args = ReportArgs::new(QueryArgs::default(), OutputArgs::new(None, dir.path()));
        let today = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();

        let out = run(&config, Mode::Test, &args, today).await.unwrap();

        let summary = out.summary().unwrap();
        assert_eq!(summary.fetch.regions, vec![Region::from("us-east-1"), Region::all()]);
        assert!(dir.path().join("spending-all-latest.json").is_file());
    }
}
