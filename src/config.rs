//! Configuration file handling for cost-report.
//!
//! The configuration file is stored at `<data-dir>/config.json`. It is optional: when it is
//! missing every setting takes its default. Settings can be overridden from the command line
//! after loading.

use crate::api::{DEFAULT_ENDPOINT, DEFAULT_SIGNING_REGION};
use crate::cache::Cache;
use crate::model::{default_regions, CostQuery, Dimension, Granularity, Metric, Region, TimePeriod};
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "cost-report";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const LOOKBACK_DAYS: u32 = 90;
const FLOOR_DOLLARS: i64 = 5;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to the data directory and from there it loads `<data-dir>/config.json`, if present.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    endpoint: Url,
}

impl Config {
    /// Creates the data directory and writes a `config.json` with default settings.
    ///
    /// # Errors
    /// - Returns an error if `config.json` already exists or if any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        utils::make_dir(&root)
            .await
            .context("Unable to create the data directory")?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("The config file already exists '{}'", config_path.display())
        }

        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        Self::new(root, config_path, config_file)
    }

    /// Loads `<dir>/config.json` when it exists and uses the defaults otherwise. The directory
    /// itself does not need to exist yet; it is created when the first snapshot is written.
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        let config_path = root.join(CONFIG_JSON);
        let config_file = if config_path.is_file() {
            ConfigFile::load(&config_path).await?
        } else {
            ConfigFile::default()
        };
        let config = Self::new(root, config_path, config_file)?;
        config.validate()?;
        Ok(config)
    }

    fn new(root: PathBuf, config_path: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let endpoint = Url::parse(&config_file.endpoint).with_context(|| {
            format!(
                "Invalid endpoint '{}' in {}",
                config_file.endpoint,
                config_path.display()
            )
        })?;
        Ok(Self {
            root,
            config_path,
            config_file,
            endpoint,
        })
    }

    /// Checks the settings for values that cannot produce a report.
    pub fn validate(&self) -> Result<()> {
        let f = &self.config_file;
        ensure!(!f.regions.is_empty(), "At least one region is required");
        for region in &f.regions {
            region.validate()?;
        }
        ensure!(!f.metrics.is_empty(), "At least one metric is required");
        ensure!(f.lookback_days >= 1, "lookback_days must be at least 1");
        ensure!(
            f.floor >= Decimal::ZERO,
            "The floor must not be negative, got {}",
            f.floor
        );
        Ok(())
    }

    /// The data directory where snapshots and `config.json` live.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn regions(&self) -> &[Region] {
        &self.config_file.regions
    }

    pub fn lookback_days(&self) -> u32 {
        self.config_file.lookback_days
    }

    pub fn granularity(&self) -> Granularity {
        self.config_file.granularity
    }

    pub fn dimension(&self) -> Dimension {
        self.config_file.dimension
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.config_file.metrics
    }

    /// The dollar amount a category must reach, summed across regions, to be plotted.
    pub fn floor(&self) -> Decimal {
        self.config_file.floor
    }

    pub fn include_total(&self) -> bool {
        self.config_file.include_total
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn signing_region(&self) -> &str {
        &self.config_file.signing_region
    }

    pub fn set_regions(&mut self, regions: Vec<Region>) {
        self.config_file.regions = regions;
    }

    pub fn set_lookback_days(&mut self, days: u32) {
        self.config_file.lookback_days = days;
    }

    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.config_file.granularity = granularity;
    }

    pub fn set_dimension(&mut self, dimension: Dimension) {
        self.config_file.dimension = dimension;
    }

    pub fn set_metrics(&mut self, metrics: Vec<Metric>) {
        self.config_file.metrics = metrics;
    }

    pub fn set_floor(&mut self, floor: Decimal) {
        self.config_file.floor = floor;
    }

    pub fn set_include_total(&mut self, include_total: bool) {
        self.config_file.include_total = include_total;
    }

    /// The regions to query: the configured ones, followed by `all` when the account-wide total
    /// is requested.
    pub fn regions_to_query(&self) -> Vec<Region> {
        let mut regions = self.regions().to_vec();
        if self.include_total() && !regions.iter().any(Region::is_total) {
            regions.push(Region::all());
        }
        regions
    }

    /// The query for a run on `today`.
    pub fn query(&self, today: NaiveDate) -> CostQuery {
        CostQuery {
            granularity: self.granularity(),
            dimension: self.dimension(),
            metrics: self.metrics().to_vec(),
            period: TimePeriod::lookback(today, self.lookback_days()),
        }
    }

    /// Creates a new `Cache` for reading and writing snapshots in the data directory.
    pub fn cache(&self) -> Cache {
        Cache::new(self)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "cost-report",
///   "config_version": 1,
///   "regions": ["us-east-1", "eu-west-1"],
///   "lookback_days": 30,
///   "floor": "10"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "cost-report"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    #[serde(default = "default_regions")]
    regions: Vec<Region>,

    #[serde(default = "default_lookback_days")]
    lookback_days: u32,

    #[serde(default)]
    granularity: Granularity,

    #[serde(default)]
    dimension: Dimension,

    #[serde(default = "default_metrics")]
    metrics: Vec<Metric>,

    /// Dollar floor for the threshold filter
    #[serde(default = "default_floor")]
    floor: Decimal,

    /// Also query the account-wide total as the pseudo region `all`
    #[serde(default)]
    include_total: bool,

    /// Cost Explorer endpoint; only changed for testing against a local server
    #[serde(default = "default_endpoint")]
    endpoint: String,

    #[serde(default = "default_signing_region")]
    signing_region: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            regions: default_regions(),
            lookback_days: default_lookback_days(),
            granularity: Granularity::default(),
            dimension: Dimension::default(),
            metrics: default_metrics(),
            floor: default_floor(),
            include_total: false,
            endpoint: default_endpoint(),
            signing_region: default_signing_region(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or is not ours
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {} in config file, expected {}",
            config.config_version,
            CONFIG_VERSION
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

fn default_lookback_days() -> u32 {
    LOOKBACK_DAYS
}

fn default_metrics() -> Vec<Metric> {
    vec![Metric::default()]
}

fn default_floor() -> Decimal {
    Decimal::from(FLOOR_DOLLARS)
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_signing_region() -> String {
    DEFAULT_SIGNING_REGION.to_string()
}
