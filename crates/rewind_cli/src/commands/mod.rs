//! CLI commands.

pub mod clean;
pub mod create;
pub mod init;
pub mod list;
pub mod restore;
pub mod show;
pub mod stats;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use rewind_core::{Checkpoints, Config};
use std::path::PathBuf;

/// Project and state directory selected by the global flags.
pub struct Target {
    pub project: PathBuf,
    pub state_dir: Option<PathBuf>,
}

impl Target {
    /// Loads the config for the selected state directory.
    pub fn config(&self) -> Result<Config> {
        match &self.state_dir {
            Some(dir) => Config::load(dir)
                .with_context(|| format!("Failed to load config from {}", dir.display())),
            None => Config::load_default().context("Failed to load config"),
        }
    }

    /// Builds and initializes the checkpoint facade.
    ///
    /// Initialization failures are not fatal here; the facade logs them and
    /// every command falls back to its empty result.
    pub fn open(&self) -> Result<Checkpoints> {
        let mut checkpoints = Checkpoints::new(&self.project, self.config()?);
        checkpoints.initialize();
        Ok(checkpoints)
    }
}

/// Local-time rendering used by every listing.
pub fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
