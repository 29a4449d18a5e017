//! These structs provide the CLI interface for the cost-report CLI.

use crate::model::{Dimension, Granularity, Metric, Region};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Environment variable that sets the data directory.
pub const DATA_DIR_ENV: &str = "COST_REPORT_DATA_DIR";

/// cost-report: download AWS spending by region and plot it per service.
///
/// The program queries AWS Cost Explorer once per region, caches the raw results and a formatted
/// CSV table in the data directory, and writes a PDF with one chart per service. Services whose
/// spending across all regions is below a dollar floor are skipped.
///
/// AWS credentials are taken from the usual places: environment variables, a profile in
/// ~/.aws/config, SSO or an instance role. The credentials need the ce:GetCostAndUsage
/// permission.
#[derive(Debug, Parser, Clone)]
#[command(name = "cost-report", version)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and write a config.json with default settings.
    ///
    /// Running this is optional. Without a config.json every setting takes its default, and all
    /// of them can be overridden on the command line.
    Init,
    /// Query every region and write raw and formatted snapshots to the data directory.
    Fetch(FetchArgs),
    /// Plot cached data without querying AWS.
    ///
    /// By default the latest formatted CSV snapshot is plotted. Use --from-raw to rebuild the
    /// table from the latest raw snapshot of each configured region instead.
    Plot(PlotArgs),
    /// Fetch, then plot, in one run.
    Report(ReportArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where snapshots and config.json are held.
    #[arg(long, env = DATA_DIR_ENV, default_value = "cache")]
    data_dir: DisplayPath,
}

impl Common {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn data_dir(&self) -> &DisplayPath {
        &self.data_dir
    }
}

/// Overrides for the query settings in config.json.
#[derive(Debug, Default, Parser, Clone)]
pub struct QueryArgs {
    /// A region to query, e.g. us-east-1. Repeat for more than one region. Use `all` for the
    /// whole account without a region filter.
    #[arg(long = "region")]
    regions: Vec<Region>,

    /// How many days back from tomorrow to query.
    #[arg(long)]
    lookback_days: Option<u32>,

    /// DAILY, MONTHLY or HOURLY.
    #[arg(long)]
    granularity: Option<Granularity>,

    /// The dimension to group costs by, e.g. SERVICE or LINKED_ACCOUNT.
    #[arg(long)]
    dimension: Option<Dimension>,

    /// The metric to request, e.g. AmortizedCost or UnblendedCost. Repeat for more than one.
    #[arg(long = "metric")]
    metrics: Vec<Metric>,

    /// Also query the account-wide total as the pseudo region `all`.
    #[arg(long)]
    include_total: bool,
}

impl QueryArgs {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn lookback_days(&self) -> Option<u32> {
        self.lookback_days
    }

    pub fn granularity(&self) -> Option<Granularity> {
        self.granularity
    }

    pub fn dimension(&self) -> Option<Dimension> {
        self.dimension
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn include_total(&self) -> bool {
        self.include_total
    }

    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }
}

/// Settings for the threshold filter and the PDF.
#[derive(Debug, Parser, Clone)]
pub struct OutputArgs {
    /// Categories whose total across regions is below this many dollars are not plotted.
    /// Defaults to the floor in config.json, or 5.
    #[arg(long)]
    floor: Option<Decimal>,

    /// The directory to write aws-spending-by-region.pdf to.
    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

impl OutputArgs {
    pub fn new(floor: Option<Decimal>, outdir: impl Into<PathBuf>) -> Self {
        Self {
            floor,
            outdir: outdir.into(),
        }
    }

    pub fn floor(&self) -> Option<Decimal> {
        self.floor
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }
}

/// (Not shown): Args for the `cost-report fetch` command.
#[derive(Debug, Parser, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    query: QueryArgs,
}

impl FetchArgs {
    pub fn query(&self) -> &QueryArgs {
        &self.query
    }
}

/// (Not shown): Args for the `cost-report plot` command.
#[derive(Debug, Parser, Clone)]
pub struct PlotArgs {
    /// The formatted CSV snapshot to plot. Defaults to spending-latest.csv in the data directory.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Rebuild the table from the latest raw snapshots instead of reading a CSV.
    #[arg(long, conflicts_with = "csv")]
    from_raw: bool,

    /// With --from-raw, a region whose snapshot is loaded. Repeat for more than one region.
    /// Defaults to the regions in config.json.
    #[arg(long = "region", requires = "from_raw")]
    regions: Vec<Region>,

    /// With --from-raw, also load the snapshot of the pseudo region `all`.
    #[arg(long, requires = "from_raw")]
    include_total: bool,

    #[command(flatten)]
    output: OutputArgs,
}

impl PlotArgs {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn include_total(&self) -> bool {
        self.include_total
    }

    pub fn csv(&self) -> Option<&Path> {
        self.csv.as_deref()
    }

    pub fn from_raw(&self) -> bool {
        self.from_raw
    }

    pub fn output(&self) -> &OutputArgs {
        &self.output
    }
}

/// (Not shown): Args for the `cost-report report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    query: QueryArgs,

    #[command(flatten)]
    output: OutputArgs,
}

impl ReportArgs {
    pub fn new(query: QueryArgs, output: OutputArgs) -> Self {
        Self { query, output }
    }

    pub fn query(&self) -> &QueryArgs {
        &self.query
    }

    pub fn output(&self) -> &OutputArgs {
        &self.output
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
