//! The `Checkpoints` facade used by hosts such as the CLI.
//!
//! Checkpointing is auxiliary to whatever the host is doing, so nothing here
//! returns an error. Failures are logged and surfaced as `None`, `false`, an
//! empty list or `0`.

use crate::config::Config;
use crate::error::{CheckpointError, Result};
use crate::metadata::Checkpoint;
use crate::recorder::{snapshot_path, CheckpointRecorder};
use crate::restore::{RestoreEngine, RestoreReport};
use crate::retention::RetentionManager;
use crate::shadow::{ShadowRepository, ShadowRepositoryManager};
use crate::snapshot::Snapshot;
use crate::TimeProvider;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One line of `list_checkpoints`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSummary {
    /// Checkpoint id (`cp_<ms>_<hex>`).
    pub id: String,
    /// Operation label given at creation.
    pub operation: String,
    /// Number of files actually captured.
    pub file_count: usize,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Whether a snapshot was stored with it.
    pub has_snapshot: bool,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(cp: &Checkpoint) -> Self {
        Self {
            id: cp.id.clone(),
            operation: cp.operation.clone(),
            file_count: cp.files.len(),
            timestamp: cp.timestamp,
            has_snapshot: cp.has_snapshot,
        }
    }
}

/// Everything known about one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointDetail {
    /// The index entry.
    pub checkpoint: Checkpoint,
    /// The stored snapshot, if the checkpoint has one and it is readable.
    pub snapshot: Option<Snapshot>,
}

/// Summary numbers for a project's checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stats {
    /// Whether the shadow repository is usable.
    pub enabled: bool,
    /// Checkpoints in the index.
    pub count: usize,
    /// Timestamp of the oldest checkpoint, if any.
    pub oldest: Option<DateTime<Utc>>,
    /// Timestamp of the newest checkpoint, if any.
    pub newest: Option<DateTime<Utc>>,
    /// `None` while checkpointing is disabled.
    pub shadow_repo_path: Option<PathBuf>,
}

/// Checkpoint and undo support for one project.
///
/// Construct one per project, call [`Checkpoints::initialize`] once, and pass
/// it by reference to whatever needs it. A failed initialization leaves the
/// instance disabled; every operation then logs a warning and returns its
/// failure value.
///
/// ```no_run
/// use rewind_core::{Checkpoints, Config};
///
/// let mut checkpoints = Checkpoints::new(".", Config::load_default().unwrap_or_default());
/// checkpoints.initialize();
///
/// if let Some(id) = checkpoints.create("edit", &["src/main.rs"], None) {
///     // ... the edit goes wrong ...
///     checkpoints.restore(&id);
/// }
/// ```
#[derive(Debug)]
pub struct Checkpoints {
    manager: ShadowRepositoryManager,
}

impl Checkpoints {
    /// Checkpoints for the project rooted at `project_dir`.
    pub fn new(project_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            manager: ShadowRepositoryManager::new(project_dir, config),
        }
    }

    /// Sets a custom time provider (Unix milliseconds) for testing.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.manager = self.manager.with_time_provider(provider);
        self
    }

    /// Opens or creates the shadow repository. `false` means disabled.
    pub fn initialize(&mut self) -> bool {
        self.manager.initialize()
    }

    /// Whether checkpointing is available.
    pub fn is_enabled(&self) -> bool {
        self.manager.is_enabled()
    }

    /// The underlying manager, for callers that want typed errors.
    pub fn manager(&self) -> &ShadowRepositoryManager {
        &self.manager
    }

    /// Captures `files` and an optional snapshot. Returns the new id.
    pub fn create<P: AsRef<Path>>(
        &self,
        operation: &str,
        files: &[P],
        snapshot: Option<&Snapshot>,
    ) -> Option<String> {
        let created = self
            .manager
            .repository()
            .and_then(|repo| CheckpointRecorder::new(repo).create(operation, files, snapshot));
        match created {
            Ok(checkpoint) => Some(checkpoint.id),
            Err(e) => {
                warn_failed("create", &e);
                None
            }
        }
    }

    /// Restores checkpoint `id`. `true` unless the id is unknown or the
    /// shadow repository could not be returned to main.
    pub fn restore(&self, id: &str) -> bool {
        self.restore_with_report(id).is_some()
    }

    /// Like [`Checkpoints::restore`], with per-file results.
    pub fn restore_with_report(&self, id: &str) -> Option<RestoreReport> {
        let restored = self
            .manager
            .repository()
            .and_then(|repo| RestoreEngine::new(repo).restore(id));
        match restored {
            Ok(report) => Some(report),
            Err(e) => {
                warn_failed("restore", &e);
                None
            }
        }
    }

    /// All checkpoints, oldest first.
    pub fn list_checkpoints(&self) -> Vec<CheckpointSummary> {
        let listed = self.manager.repository().and_then(|repo| repo.load_metadata());
        match listed {
            Ok(metadata) => metadata.checkpoints.iter().map(CheckpointSummary::from).collect(),
            Err(e) => {
                warn_failed("list", &e);
                Vec::new()
            }
        }
    }

    /// Full record of checkpoint `id`, including its snapshot.
    pub fn show(&self, id: &str) -> Option<CheckpointDetail> {
        let shown = self.manager.repository().and_then(|repo| detail(repo, id));
        match shown {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn_failed("show", &e);
                None
            }
        }
    }

    /// Drops checkpoints older than `days_to_keep` days. Returns how many.
    pub fn clean(&self, days_to_keep: u32) -> usize {
        let cleaned = self
            .manager
            .repository()
            .and_then(|repo| RetentionManager::new(repo).clean(days_to_keep));
        match cleaned {
            Ok(count) => count,
            Err(e) => {
                warn_failed("clean", &e);
                0
            }
        }
    }

    /// Drops checkpoints older than the configured default window.
    pub fn clean_default(&self) -> usize {
        self.clean(self.manager.config().retention.default_days)
    }

    /// Count and age range of the recorded checkpoints.
    pub fn stats(&self) -> Stats {
        let Ok(repo) = self.manager.repository() else {
            return Stats::default();
        };

        match repo.load_metadata() {
            Ok(metadata) => {
                let times = metadata.checkpoints.iter().map(|cp| cp.timestamp);
                Stats {
                    enabled: true,
                    count: metadata.checkpoints.len(),
                    oldest: times.clone().min(),
                    newest: times.max(),
                    shadow_repo_path: Some(repo.dir().to_path_buf()),
                }
            }
            Err(e) => {
                warn_failed("stats", &e);
                Stats {
                    enabled: true,
                    shadow_repo_path: Some(repo.dir().to_path_buf()),
                    ..Stats::default()
                }
            }
        }
    }

    /// Releases the shadow repository. The instance is unusable afterwards
    /// until initialized again.
    pub fn shutdown(&mut self) {
        self.manager.shutdown();
    }
}

fn detail(repo: &ShadowRepository, id: &str) -> Result<CheckpointDetail> {
    let metadata = repo.load_metadata()?;
    let checkpoint = metadata
        .find(id)
        .cloned()
        .ok_or_else(|| CheckpointError::CheckpointNotFound(id.to_string()))?;

    let snapshot = if checkpoint.has_snapshot {
        let history = repo.history();
        let stored = history
            .resolve(&checkpoint.history_ref)
            .and_then(|commit| history.read_path(commit, &snapshot_path(&checkpoint.id)));
        match stored {
            Ok(Some(bytes)) => Some(Snapshot::from_bytes(bytes)),
            Ok(None) => {
                warn!(checkpoint = %checkpoint.id, "Snapshot missing from checkpoint");
                None
            }
            Err(e) => {
                warn!(checkpoint = %checkpoint.id, error = %e, "Could not read checkpoint snapshot");
                None
            }
        }
    } else {
        None
    };

    Ok(CheckpointDetail {
        checkpoint,
        snapshot,
    })
}

fn warn_failed(operation: &str, error: &CheckpointError) {
    match error.recovery_suggestion() {
        Some(hint) => warn!(operation, error = %error, hint, "Checkpoint operation failed"),
        None => warn!(operation, error = %error, "Checkpoint operation failed"),
    }
}
