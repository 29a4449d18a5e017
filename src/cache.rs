//! The local cache of query results: raw per-region snapshots and the formatted spending table.
//!
//! Every write produces two files with identical content, one named for the capture date and one
//! named `latest`. Re-running on the same day overwrites both.

use crate::model::{RawSnapshot, Region, SpendingTable};
use crate::{utils, Config, Result};
use anyhow::{bail, Context};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix shared by every cache file.
pub const PREFIX: &str = "spending";

/// Suffix used instead of a date for the most recent copy.
pub const LATEST: &str = "latest";

/// Reads and writes snapshot files in the data directory.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Creates a new `Cache` rooted at the data directory of `config`.
    pub fn new(config: &Config) -> Self {
        Self::in_dir(config.root())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `spending-<region>-<date>.json`
    pub fn raw_path(&self, region: &Region, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{PREFIX}-{region}-{}.json", date.format("%Y-%m-%d")))
    }

    /// `spending-<region>-latest.json`
    pub fn latest_raw_path(&self, region: &Region) -> PathBuf {
        self.dir.join(format!("{PREFIX}-{region}-{LATEST}.json"))
    }

    /// `spending-<date>.csv`
    pub fn formatted_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{PREFIX}-{}.csv", date.format("%Y-%m-%d")))
    }

    /// `spending-latest.csv`
    pub fn latest_csv(&self) -> PathBuf {
        self.dir.join(format!("{PREFIX}-{LATEST}.csv"))
    }

    /// Writes `snapshot` as pretty-printed JSON to its dated file and to its latest file.
    ///
    /// Returns the two paths, dated first.
    pub async fn save_raw(&self, snapshot: &RawSnapshot) -> Result<Vec<PathBuf>> {
        let json = serde_json::to_string_pretty(snapshot)
            .with_context(|| format!("Failed to serialize the {} snapshot", snapshot.region))?;
        let paths = vec![
            self.raw_path(&snapshot.region, snapshot.captured),
            self.latest_raw_path(&snapshot.region),
        ];
        self.write_all(&paths, json.as_bytes(), "raw results").await?;
        Ok(paths)
    }

    /// Writes `table` as CSV to the file for `date` and to the latest file.
    ///
    /// Returns the two paths, dated first.
    pub async fn save_formatted(
        &self,
        table: &SpendingTable,
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>> {
        let csv = table.to_csv()?;
        let paths = vec![self.formatted_path(date), self.latest_csv()];
        self.write_all(&paths, &csv, "formatted results").await?;
        Ok(paths)
    }

    /// Loads the most recent raw snapshot for `region`.
    pub async fn load_latest_raw(&self, region: &Region) -> Result<RawSnapshot> {
        let path = self.latest_raw_path(region);
        if !path.is_file() {
            bail!(
                "There is no cached snapshot for region {region} at {}, run fetch first",
                path.display()
            )
        }
        utils::deserialize(&path).await
    }

    /// Loads a formatted table from `path`.
    pub async fn load_formatted(&self, path: &Path) -> Result<SpendingTable> {
        if !path.is_file() {
            bail!("CSV file {} does not exist", path.display())
        }
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        SpendingTable::read_csv(data.as_slice())
            .with_context(|| format!("Failed to load spending table from {}", path.display()))
    }

    async fn write_all(&self, paths: &[PathBuf], contents: &[u8], what: &str) -> Result<()> {
        utils::make_dir(&self.dir).await?;
        for path in paths {
            info!("Saving {what} to {}", utils::relative(path).display());
            utils::write(path, contents).await?;
        }
        Ok(())
    }
}
