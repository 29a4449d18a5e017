//! The Spending Table: a dense, long-format table of amounts keyed by region, metric, date and
//! category.

use crate::model::{Amount, Region};
use crate::Result;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// One row of the table. This is also the row format of the formatted CSV snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SpendingRecord {
    pub region: Region,
    /// The normalized category name, e.g. `amazon-simple-storage-service`.
    pub group: String,
    pub metric: String,
    pub amount: Amount,
    pub unit: String,
    pub start_date: String,
    pub end_date: String,
}

/// A table of `SpendingRecord`s. It is built fresh from raw snapshots on every run (see
/// `crate::aggregate`) or read back from the formatted CSV snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendingTable {
    records: Vec<SpendingRecord>,
}

impl SpendingTable {
    pub fn new(records: Vec<SpendingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SpendingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Regions in the order they first appear.
    pub fn regions(&self) -> Vec<Region> {
        let mut seen = BTreeSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(&r.region))
            .map(|r| r.region.clone())
            .collect()
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.group.clone()).collect()
    }

    pub fn metrics(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.metric.clone()).collect()
    }

    /// Bucket start dates, sorted.
    pub fn dates(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.start_date.clone()).collect()
    }

    /// All rows for one category and metric, across every region and date.
    pub fn rows<'a>(
        &'a self,
        category: &'a str,
        metric: &'a str,
    ) -> impl Iterator<Item = &'a SpendingRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.group == category && r.metric == metric)
    }

    /// The single unit shared by the rows of one category and metric. Amounts in different units
    /// cannot share an axis, so more than one unit is an error.
    pub fn unit(&self, category: &str, metric: &str) -> Result<String> {
        let units: BTreeSet<&str> = self
            .rows(category, metric)
            .map(|r| r.unit.as_str())
            .collect();
        match units.len() {
            0 => bail!("No rows for category '{category}' and metric '{metric}'"),
            1 => Ok(units.into_iter().next().unwrap_or_default().to_string()),
            _ => bail!(
                "Trying to compare different units for '{category}' ({metric}): {}",
                units.into_iter().collect::<Vec<_>>().join(", ")
            ),
        }
    }

    /// Writes the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(record)
                .context("Unable to serialize spending record to CSV")?;
        }
        wtr.flush().context("Unable to flush CSV data")?;
        Ok(())
    }

    /// Returns the table as CSV.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }

    /// Reads a table from CSV written by `write_csv`.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for (i, result) in rdr.deserialize().enumerate() {
            let record: SpendingRecord =
                result.with_context(|| format!("Unable to parse CSV row {}", i + 1))?;
            records.push(record);
        }
        Ok(Self::new(records))
    }
}
