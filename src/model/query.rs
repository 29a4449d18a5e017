//! The parameters of a cost-and-usage query: granularity, metrics, grouping dimension, the time
//! period and the region it is filtered to.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// The time-bucket size of a cost query.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    #[default]
    Daily,
    Monthly,
    Hourly,
}

serde_plain::derive_display_from_serialize!(Granularity);
serde_plain::derive_fromstr_from_deserialize!(Granularity);

/// The cost (or usage) measure requested from the API.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum Metric {
    #[default]
    AmortizedCost,
    BlendedCost,
    NetAmortizedCost,
    NetUnblendedCost,
    NormalizedUsageAmount,
    UnblendedCost,
    UsageQuantity,
}

serde_plain::derive_display_from_serialize!(Metric);
serde_plain::derive_fromstr_from_deserialize!(Metric);

/// The category axis used to group costs.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    #[serde(rename = "AZ")]
    Az,
    InstanceType,
    LegalEntityName,
    InvoicingEntity,
    LinkedAccount,
    Operation,
    Platform,
    PurchaseType,
    #[default]
    Service,
    Tenancy,
    RecordType,
    UsageType,
}

serde_plain::derive_display_from_serialize!(Dimension);
serde_plain::derive_fromstr_from_deserialize!(Dimension);

/// A region identifier such as `us-east-1`, or the pseudo region `all`, which queries the whole
/// account without a region filter.
///
/// Region names end up in cache file names, so parsing and deserialization reject names that
/// could point outside the data directory.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// The name of the pseudo region that represents the account-wide total.
    pub const ALL: &'static str = "all";

    /// Creates a region from a trimmed `name` without checking it. See `validate`.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    /// Errors if the name is empty, is `.` or `..`, or contains a path separator.
    pub fn validate(&self) -> Result<(), RegionError> {
        let name = self.0.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(RegionError(name.to_string()));
        }
        Ok(())
    }

    /// The account-wide pseudo region.
    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the pseudo region `all`, which must not be filtered by region when queried.
    pub fn is_total(&self) -> bool {
        self.0 == Self::ALL
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let region = Region::new(s);
        region.validate()?;
        Ok(region)
    }
}

impl TryFrom<String> for Region {
    type Error = RegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Region::from_str(&value)
    }
}

impl From<Region> for String {
    fn from(value: Region) -> Self {
        value.0
    }
}

impl From<&str> for Region {
    fn from(value: &str) -> Self {
        Region::new(value)
    }
}

/// A region name that cannot be used, e.g. `../x`.
pub struct RegionError(String);

impl Debug for RegionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for RegionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid region name '{}': it must be non-empty and must not contain a path \
             separator",
            self.0
        )
    }
}

impl std::error::Error for RegionError {}

/// The regions queried when nothing else is configured.
pub fn default_regions() -> Vec<Region> {
    ["us-east-1", "us-east-2", "us-west-1", "us-west-2"]
        .into_iter()
        .map(Region::from)
        .collect()
}

/// A closed-open date interval `[start, end)` as used by the API.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimePeriod {
    /// The window that ends tomorrow (so that today is included) and starts `days` before that.
    pub fn lookback(today: NaiveDate, days: u32) -> Self {
        let end = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }
}

/// Everything needed to issue one cost-and-usage request, except the region.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CostQuery {
    pub granularity: Granularity,
    pub dimension: Dimension,
    pub metrics: Vec<Metric>,
    pub period: TimePeriod,
}
