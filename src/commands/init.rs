use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory and an initial `config.json` with default settings.
///
/// # Arguments
/// - `data_dir` - The directory that will hold snapshots and `config.json`, e.g. `./cache`
///
/// # Errors
/// - Returns an error if `config.json` already exists or any file operation fails.
pub async fn init(data_dir: &Path) -> Result<Out<()>> {
    let config = Config::create(data_dir)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(Out::new_message(format!(
        "Successfully created {}, edit it to change the regions, metrics and floor",
        config.config_path().display()
    )))
}
