//! Arguments and start-up shared by the command-line tools.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;

use crate::config::CalibSettings;

pub const DEFAULT_CONFIG: &str = "config.ini";

/// `-c/--config` and `-v/--verbose`, flattened into every tool that reads the
/// configuration.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct LogArgs {
    /// Increase output verbosity
    #[arg(short, long)]
    pub verbose: bool,
}

impl LogArgs {
    /// Console logging only.
    pub fn init(self) -> anyhow::Result<()> {
        init_logging(self.verbose, None)
    }
}

impl ConfigArgs {
    /// Load the configuration, then start logging with its log directory.
    pub fn init(&self) -> anyhow::Result<CalibSettings> {
        init_with_config(&self.config, self.log.verbose)
    }
}

pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    common::log_setup::setup_logging(common::log_setup::level_for(verbose), log_dir)
        .context("Failed to set up logging")
}

/// Load `config`, start logging and log where the settings came from.
pub fn init_with_config(config: &Path, verbose: bool) -> anyhow::Result<CalibSettings> {
    let settings = CalibSettings::load(config)
        .with_context(|| format!("Failed to load configuration '{}'", config.display()))?;
    init_logging(verbose, settings.log_dir.as_deref())?;
    tracing::debug!(
        config = %config.display(),
        working_dir = %settings.working_dir.display(),
        "Configuration loaded"
    );
    Ok(settings)
}
