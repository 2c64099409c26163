//! Creating checkpoints: capture, commit, index.

use crate::error::{CheckpointError, Result};
use crate::history::{FILES_DIR, SNAPSHOTS_DIR};
use crate::metadata::{Checkpoint, Metadata};
use crate::object_store::MAX_BLOB_SIZE;
use crate::shadow::ShadowRepository;
use crate::snapshot::Snapshot;
use crate::ObjectId;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of every checkpoint id.
pub const CHECKPOINT_ID_PREFIX: &str = "cp_";

/// Hex characters of randomness in an id.
const ID_RANDOM_LEN: usize = 8;

/// Records checkpoints into a shadow repository.
///
/// A checkpoint becomes visible only when both the shadow commit and its
/// index entry exist. Any failure in between puts the main line and the
/// worktree back where they were.
pub struct CheckpointRecorder<'a> {
    repo: &'a ShadowRepository,
}

impl<'a> CheckpointRecorder<'a> {
    /// A recorder writing into `repo`.
    pub fn new(repo: &'a ShadowRepository) -> Self {
        Self { repo }
    }

    /// Captures `files` (and an optional snapshot) as a new checkpoint.
    ///
    /// Paths may be absolute or relative to the project root. Paths that are
    /// missing, are not regular files, or lie outside the project are
    /// skipped with a warning; they are not errors.
    pub fn create<P: AsRef<Path>>(
        &self,
        operation: &str,
        files: &[P],
        snapshot: Option<&Snapshot>,
    ) -> Result<Checkpoint> {
        let _lock = self.repo.lock()?;
        let history = self.repo.history();

        let mut metadata = self.repo.load_metadata()?;
        let now_ms = self.repo.now_ms();
        let id = unique_id(&metadata, now_ms);

        if history.is_detached()? {
            warn!("Shadow HEAD was detached before checkpoint, returning to main");
            history.checkout_main()?;
        }
        let parent = history.main_id()?;

        let staged = match self.stage(&id, operation, files, snapshot, now_ms) {
            Ok(staged) => staged,
            Err(e) => {
                self.discard_staging();
                return Err(e);
            }
        };

        let checkpoint = Checkpoint {
            id,
            history_ref: staged.commit.as_hex(),
            operation: operation.to_string(),
            files: staged.files,
            timestamp: self.repo.now(),
            has_snapshot: snapshot.is_some(),
        };

        metadata.checkpoints.push(checkpoint.clone());
        if let Err(e) = self.repo.save_metadata(&metadata) {
            warn!(checkpoint = %checkpoint.id, error = %e, "Could not record checkpoint, rolling back commit");
            self.roll_back(parent);
            return Err(e);
        }

        info!(
            checkpoint = %checkpoint.id,
            operation,
            files = checkpoint.files.len(),
            snapshot = checkpoint.has_snapshot,
            "Created checkpoint"
        );
        Ok(checkpoint)
    }

    /// Copies inputs into the worktree and commits them.
    fn stage<P: AsRef<Path>>(
        &self,
        id: &str,
        operation: &str,
        files: &[P],
        snapshot: Option<&Snapshot>,
        now_ms: i64,
    ) -> Result<Staged> {
        let history = self.repo.history();
        let project = self.repo.project_path();

        let mut captured = Vec::new();
        let mut seen = BTreeSet::new();
        let mut repo_paths = Vec::new();

        for input in files {
            let input = input.as_ref();
            let Some(relative) = project_relative(project, input) else {
                warn!(path = %input.display(), "Skipping file outside the project");
                continue;
            };
            if !seen.insert(relative.clone()) {
                continue;
            }

            let source = to_native(project, &relative);
            let bytes = match read_regular_file(&source) {
                Ok(Source::Bytes(bytes)) => bytes,
                Ok(Source::Missing) => {
                    warn!(path = %relative, "Skipping missing file");
                    continue;
                }
                Ok(Source::TooLarge(size)) => {
                    warn!(path = %relative, size, limit = MAX_BLOB_SIZE, "Skipping file above the size limit");
                    continue;
                }
                Err(e) => {
                    warn!(path = %relative, error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            let repo_path = format!("{}/{}", FILES_DIR, relative);
            write_worktree(history.root(), &history.worktree_path(&repo_path), &bytes)?;
            repo_paths.push(repo_path);
            captured.push(relative);
        }

        if let Some(snapshot) = snapshot {
            let repo_path = snapshot_path(id);
            write_worktree(history.root(), &history.worktree_path(&repo_path), snapshot.as_bytes())?;
            repo_paths.push(repo_path);
        }

        debug!(checkpoint = id, captured = captured.len(), "staged checkpoint");
        let commit = history.commit(&repo_paths, &commit_message(operation, id, &captured), now_ms)?;

        Ok(Staged {
            commit,
            files: captured,
        })
    }

    fn discard_staging(&self) {
        if let Err(e) = self.repo.history().reset_worktree() {
            warn!(error = %e, "Could not clean shadow worktree after failed checkpoint");
        }
    }

    fn roll_back(&self, parent: ObjectId) {
        if let Err(e) = self.repo.history().reset_main(parent) {
            warn!(error = %e, "Could not move shadow main back after failed checkpoint");
        }
        self.discard_staging();
    }
}

struct Staged {
    commit: ObjectId,
    files: Vec<String>,
}

/// Worktree path of a checkpoint's snapshot.
pub(crate) fn snapshot_path(id: &str) -> String {
    format!("{}/{}.json", SNAPSHOTS_DIR, id)
}

/// `cp_<unix-ms>_<8 hex>`, regenerated until unused in `metadata`.
fn unique_id(metadata: &Metadata, now_ms: i64) -> String {
    loop {
        let random = Uuid::new_v4().simple().to_string();
        let id = format!("{}{}_{}", CHECKPOINT_ID_PREFIX, now_ms, &random[..ID_RANDOM_LEN]);
        if !metadata.contains(&id) {
            return id;
        }
    }
}

fn commit_message(operation: &str, id: &str, files: &[String]) -> String {
    let mut message = format!("{}\n\nCheckpoint: {}\nFiles:", operation, id);
    for file in files {
        message.push_str("\n- ");
        message.push_str(file);
    }
    message
}

/// Normalizes `input` to a `/`-separated path relative to `project`.
///
/// Returns `None` for paths that escape the project or name the root itself.
pub(crate) fn project_relative(project: &Path, input: &Path) -> Option<String> {
    let relative: PathBuf = if input.is_absolute() {
        match input.strip_prefix(project) {
            Ok(rest) => rest.to_path_buf(),
            // The caller may hold a non-canonical spelling of the same root.
            Err(_) => fs::canonicalize(input)
                .ok()?
                .strip_prefix(project)
                .ok()?
                .to_path_buf(),
        }
    } else {
        input.to_path_buf()
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Joins a `/`-separated relative path onto `base`.
pub(crate) fn to_native(base: &Path, relative: &str) -> PathBuf {
    relative.split('/').fold(base.to_path_buf(), |acc, part| acc.join(part))
}

enum Source {
    Bytes(Vec<u8>),
    Missing,
    TooLarge(u64),
}

/// Reads a regular file, checking its size before loading it.
fn read_regular_file(path: &Path) -> std::io::Result<Source> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            if meta.len() > MAX_BLOB_SIZE as u64 {
                return Ok(Source::TooLarge(meta.len()));
            }
            fs::read(path).map(Source::Bytes)
        }
        Ok(_) => Ok(Source::Missing),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Source::Missing),
        Err(e) => Err(e),
    }
}

/// Writes one staged file under `root`, first removing whatever stands in
/// its way from earlier captures: a directory at `path`, or a file at one
/// of its parents.
fn write_worktree(root: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    clear_conflicts(root, path)
        .and_then(|()| match path.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        })
        .and_then(|()| fs::write(path, bytes))
        .map_err(|e| {
            CheckpointError::CommitFailed(format!("could not stage {}: {}", path.display(), e))
        })
}

fn clear_conflicts(root: &Path, path: &Path) -> std::io::Result<()> {
    if matches!(fs::symlink_metadata(path), Ok(meta) if meta.is_dir()) {
        fs::remove_dir_all(path)?;
    }
    for ancestor in path.ancestors().skip(1) {
        if ancestor == root || !ancestor.starts_with(root) {
            break;
        }
        if matches!(fs::symlink_metadata(ancestor), Ok(meta) if !meta.is_dir()) {
            fs::remove_file(ancestor)?;
        }
    }
    Ok(())
}
