use crate::aggregate::aggregate;
use crate::args::OutputArgs;
use crate::commands::Out;
use crate::filter::{self, Skipped};
use crate::model::{Amount, SpendingTable};
use crate::{plot, utils, Config, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where `plot` gets its table from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotSource {
    /// A formatted CSV snapshot.
    Csv(PathBuf),
    /// The latest raw snapshot of each configured region, aggregated on the fly.
    Raw,
}

/// What `plot` drew and what it left out.
#[derive(Debug, Clone, Serialize)]
pub struct PlotSummary {
    /// `None` when no category reached the floor.
    pub pdf: Option<PathBuf>,
    pub plotted: Vec<String>,
    pub skipped: Vec<Skipped>,
}

impl PlotSummary {
    pub(super) fn message(&self) -> String {
        match &self.pdf {
            Some(pdf) => format!(
                "Plotted {} categories to {}, skipped {}",
                self.plotted.len(),
                utils::relative(pdf).display(),
                self.skipped.len()
            ),
            None => format!(
                "Nothing to plot, skipped {} categories",
                self.skipped.len()
            ),
        }
    }
}

/// Loads a cached table, drops categories below the floor and writes the PDF.
pub async fn plot(
    mut config: Config,
    source: PlotSource,
    output: &OutputArgs,
) -> Result<Out<PlotSummary>> {
    apply_output_args(&mut config, output)?;
    let table = load_table(&config, source).await?;
    let summary = plot_table(&table, config.floor(), output.outdir()).await?;
    Ok(Out::new(summary.message(), summary))
}

pub(super) fn apply_output_args(config: &mut Config, output: &OutputArgs) -> Result<()> {
    if let Some(floor) = output.floor() {
        config.set_floor(floor);
    }
    config.validate()
}

async fn load_table(config: &Config, source: PlotSource) -> Result<SpendingTable> {
    let cache = config.cache();
    match source {
        PlotSource::Csv(path) => cache.load_formatted(&path).await,
        PlotSource::Raw => {
            let mut snapshots = Vec::new();
            for region in config.regions_to_query() {
                snapshots.push(cache.load_latest_raw(&region).await?);
            }
            Ok(aggregate(&snapshots))
        }
    }
}

pub(super) async fn plot_table(
    table: &SpendingTable,
    floor: Decimal,
    outdir: &Path,
) -> Result<PlotSummary> {
    let outcome = filter::apply(table, floor);
    let plotted: Vec<String> = outcome.keep.iter().cloned().collect();

    if plotted.is_empty() {
        warn!(
            "No category reached the floor of {}, not writing {}",
            Amount::new(floor),
            plot::PDF_NAME
        );
        return Ok(PlotSummary {
            pdf: None,
            plotted,
            skipped: outcome.skipped,
        });
    }

    let charts = plot::charts(table, &outcome.keep)?;
    let pdf = plot::save(&charts, outdir).await?;
    info!("Saved {} charts to {}", charts.len(), utils::relative(&pdf).display());

    Ok(PlotSummary {
        pdf: Some(pdf),
        plotted,
        skipped: outcome.skipped,
    })
}
