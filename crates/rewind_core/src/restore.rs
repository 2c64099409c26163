//! Restoring project files from a checkpoint.

use crate::error::{CheckpointError, Result};
use crate::history::{History, FILES_DIR};
use crate::metadata::Checkpoint;
use crate::recorder::to_native;
use crate::shadow::ShadowRepository;
use crate::ObjectId;
use std::fs;
use tracing::{info, warn};

/// Outcome of a restore, file by file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// The checkpoint that was restored.
    pub checkpoint_id: String,
    /// Paths written back into the project.
    pub restored: Vec<String>,
    /// Recorded paths with no content in the checkpoint.
    pub missing: Vec<String>,
    /// Paths that could not be written, with the error.
    pub failed: Vec<(String, String)>,
}

impl RestoreReport {
    fn new(checkpoint_id: &str) -> Self {
        Self {
            checkpoint_id: checkpoint_id.to_string(),
            ..Default::default()
        }
    }

    /// Whether any recorded file was not restored.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty() || !self.failed.is_empty()
    }
}

/// Copies a checkpoint's files back into the project.
///
/// Restoring never rewinds the history itself: HEAD is parked on the
/// checkpoint's commit only while files are copied and always returns to
/// main afterwards, so later checkpoints stay reachable.
pub struct RestoreEngine<'a> {
    repo: &'a ShadowRepository,
}

impl<'a> RestoreEngine<'a> {
    /// An engine reading from `repo`.
    pub fn new(repo: &'a ShadowRepository) -> Self {
        Self { repo }
    }

    /// Restores checkpoint `id`.
    ///
    /// An unknown id fails with `CheckpointNotFound` before anything is
    /// touched. Files recorded in the checkpoint but absent from its commit
    /// are reported in [`RestoreReport::missing`] and do not fail the call.
    /// Failing to return HEAD to main does.
    pub fn restore(&self, id: &str) -> Result<RestoreReport> {
        let _lock = self.repo.lock()?;
        let history = self.repo.history();

        let metadata = self.repo.load_metadata()?;
        let checkpoint = metadata
            .find(id)
            .ok_or_else(|| CheckpointError::CheckpointNotFound(id.to_string()))?;
        let commit = history.resolve(&checkpoint.history_ref)?;

        let head = HeadGuard::new(history);
        let copied = self.copy_out(history, commit, checkpoint);
        let returned = head.finish();

        let report = copied?;
        returned?;

        info!(
            checkpoint = %report.checkpoint_id,
            restored = report.restored.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "Restored checkpoint"
        );
        Ok(report)
    }

    fn copy_out(&self, history: &History, commit: ObjectId, checkpoint: &Checkpoint) -> Result<RestoreReport> {
        history.checkout_detached(commit)?;

        let project = self.repo.project_path();
        let mut report = RestoreReport::new(&checkpoint.id);

        for relative in &checkpoint.files {
            let source = history.worktree_path(&format!("{}/{}", FILES_DIR, relative));
            if !source.is_file() {
                warn!(checkpoint = %checkpoint.id, path = %relative, "File missing from checkpoint, skipping");
                report.missing.push(relative.clone());
                continue;
            }

            let target = to_native(project, relative);
            let written = target
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::copy(&source, &target).map(|_| ()));

            match written {
                Ok(()) => report.restored.push(relative.clone()),
                Err(e) => {
                    warn!(checkpoint = %checkpoint.id, path = %relative, error = %e, "Could not restore file");
                    report.failed.push((relative.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

/// Puts HEAD back on main when a restore ends, however it ends.
///
/// [`HeadGuard::finish`] reports the outcome; if the guard is dropped
/// without it (a panic mid-copy), the drop does its best and logs.
struct HeadGuard<'h> {
    history: Option<&'h History>,
}

impl<'h> HeadGuard<'h> {
    fn new(history: &'h History) -> Self {
        Self {
            history: Some(history),
        }
    }

    fn finish(mut self) -> Result<()> {
        match self.history.take() {
            Some(history) => history.checkout_main(),
            None => Ok(()),
        }
    }
}

impl Drop for HeadGuard<'_> {
    fn drop(&mut self) {
        if let Some(history) = self.history.take() {
            if let Err(e) = history.checkout_main() {
                warn!(error = %e, "Could not return shadow HEAD to main");
            }
        }
    }
}
