//! Command implementations.

mod position;
mod run;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::ShipperConfig;

use crate::error::CliError;

pub use position::run_position;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load and validate the configuration at `path`
fn load_config(path: &Path) -> Result<ShipperConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
