//! Command handlers for the cost-report CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod fetch;
mod init;
mod plot;
mod report;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use fetch::{fetch, FetchSummary};
pub use init::init;
pub use plot::{plot, PlotSource, PlotSummary};
pub use report::{report, ReportSummary};

/// What a command reports back to `main`: a one-line message for the user and, for the pipeline
/// commands, a summary of the regions queried, the files written and the categories plotted or
/// skipped.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    message: String,
    summary: Option<T>,
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    pub fn new<S>(message: S, summary: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            summary: Some(summary),
        }
    }

    /// An `Out` for commands like `init` that have nothing to summarize.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            summary: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn summary(&self) -> Option<&T> {
        self.summary.as_ref()
    }

    /// Logs the message at info. The summary lists every file written, so it only goes to
    /// `debug!`, as pretty JSON.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(summary) = self.summary() {
            if let Ok(json) = serde_json::to_string_pretty(summary) {
                debug!("Summary:\n{json}");
            }
        }
    }
}
