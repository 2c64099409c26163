//! Configuration for the checkpoint subsystem.

use crate::error::{CheckpointError, Result};
use crate::object_store::DEFAULT_COMPRESSION_LEVEL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the state directory.
pub const STATE_DIR_ENV: &str = "REWIND_HOME";

/// Name of the config file inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration, read from `<state_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Storage-related configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Shadow history configuration.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Cross-process lock configuration.
    #[serde(default)]
    pub lock: LockConfig,

    /// Retention defaults.
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Config {
    /// Loads `config.toml` from `state_dir`, falling back to defaults when the
    /// file does not exist. Unless the file names another one, the returned
    /// config is rooted at `state_dir`.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::with_state_dir(state_dir));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| CheckpointError::ConfigError(format!("failed to read config: {}", e)))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| CheckpointError::ConfigError(format!("failed to parse config: {}", e)))?;

        if config.storage.state_dir.is_none() {
            config.storage.state_dir = Some(state_dir.to_path_buf());
        }
        Ok(config)
    }

    /// Loads the config from the default state directory.
    pub fn load_default() -> Result<Self> {
        let state_dir = default_state_dir()?;
        Self::load(&state_dir)
    }

    /// Writes the config back to `<state_dir>/config.toml`.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CheckpointError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::create_dir_all(state_dir)?;
        fs::write(state_dir.join(CONFIG_FILE), content)
            .map_err(|e| CheckpointError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// A config rooted at an explicit state directory, other values default.
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        let mut config = Config::default();
        config.storage.state_dir = Some(state_dir.into());
        config
    }

    /// Resolves the effective state directory.
    ///
    /// Order: `storage.state_dir`, then `$REWIND_HOME`, then the platform's
    /// local data directory.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.storage.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_dir(),
        }
    }
}

fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|d| d.join("rewind"))
        .ok_or_else(|| CheckpointError::ConfigError("no local data directory on this platform".to_string()))
}

/// Storage-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Explicit state directory. Shadow repositories live under
    /// `<state_dir>/history/<project-hash>/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Compression level for zstd (1-22, default: 3).
    pub compression_level: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Shadow history configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Upper bound for a single commit or checkout (default: 30s).
    pub timeout_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl HistoryConfig {
    /// Returns the timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Lock acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockConfig {
    /// Attempts after the first before giving up (default: 5).
    pub retries: u32,

    /// Initial backoff; doubles on every retry (default: 50ms).
    pub backoff_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff_ms: 50,
        }
    }
}

impl LockConfig {
    /// Backoff before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// Retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionConfig {
    /// Days kept by `clean` when the caller gives no explicit window.
    pub default_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { default_days: 30 }
    }
}
