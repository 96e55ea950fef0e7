//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;

use std::path::Path;

use clap::ValueEnum;
use scrub_core::models::config::{ScrubConfig, UnlockStrategy};

/// Unlock strategy selectable on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    /// Decrypt in memory
    InProcess,
    /// Run the configured external tool (qpdf)
    ExternalTool,
}

impl From<StrategyArg> for UnlockStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::InProcess => UnlockStrategy::InProcess,
            StrategyArg::ExternalTool => UnlockStrategy::ExternalTool,
        }
    }
}

/// Load the explicit config file, else the default one if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ScrubConfig> {
    if let Some(path) = config_path {
        return Ok(ScrubConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(ScrubConfig::from_file(&default_path)?)
    } else {
        Ok(ScrubConfig::default())
    }
}
