//! The shadow history: commits, HEAD movement and the materialized worktree.
//!
//! A shadow repository directory looks like this:
//!
//! ```text
//! <repo>/
//!   HEAD              "ref: main" or a detached commit id
//!   refs/main         tip of the main line
//!   objects/          content-addressed blobs, trees, commits
//!   files/            worktree: captured project files
//!   snapshots/        worktree: opaque conversation snapshots
//! ```
//!
//! `files/` and `snapshots/` always mirror the tree of whatever HEAD points
//! at. Commits are cumulative: each one carries the parent's tree plus the
//! paths staged for it.

use crate::config::Config;
use crate::error::{CheckpointError, Result};
use crate::object_id::ObjectKind;
use crate::refs::{Head, Refs, MAIN};
use crate::tree::{build_tree, flatten_tree, insert_replacing, lookup_path, PathMap};
use crate::types::{Commit, COMMITTER};
use crate::{ObjectId, ObjectStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Worktree directory holding captured project files.
pub const FILES_DIR: &str = "files";

/// Worktree directory holding conversation snapshots.
pub const SNAPSHOTS_DIR: &str = "snapshots";

const WORKTREE_DIRS: [&str; 2] = [FILES_DIR, SNAPSHOTS_DIR];

const INITIAL_MESSAGE: &str = "Initial checkpoint state";

/// Time budget for one history operation.
///
/// An expired deadline is reported as `CheckpointError::Timeout`, which
/// callers handle exactly like any other commit or checkout failure.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
    operation: &'static str,
}

impl Deadline {
    /// Starts the clock for `operation`.
    pub fn start(operation: &'static str, timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            operation,
        }
    }

    /// Fails once the budget is spent.
    pub fn check(&self) -> Result<()> {
        if self.started.elapsed() >= self.timeout {
            return Err(CheckpointError::Timeout {
                operation: self.operation.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Versioned storage for one shadow repository.
pub struct History {
    root: PathBuf,
    store: ObjectStore,
    refs: Refs,
    timeout: Duration,
}

impl History {
    /// Opens the history rooted at `root` without touching the disk.
    pub fn open(root: impl AsRef<Path>, config: &Config) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            store: ObjectStore::new(root.join("objects"))
                .with_compression_level(config.storage.compression_level),
            refs: Refs::new(&root),
            timeout: config.history.timeout(),
            root,
        }
    }

    /// Overrides the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shadow repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The underlying object store.
    pub fn object_store(&self) -> &ObjectStore {
        &self.store
    }

    /// Whether `refs/main` resolves to a readable commit.
    pub fn is_initialized(&self) -> bool {
        self.refs
            .read_ref(MAIN)
            .and_then(|id| self.commit_object(id))
            .is_ok()
    }

    /// Creates the directory layout, an empty-tree initial commit, and an
    /// attached HEAD. Returns the initial commit id.
    pub fn init(&self, now_ms: i64) -> Result<ObjectId> {
        fs::create_dir_all(self.root.join("objects"))?;
        fs::create_dir_all(self.root.join("refs"))?;
        for dir in WORKTREE_DIRS {
            fs::create_dir_all(self.root.join(dir))?;
        }

        let empty = build_tree(&PathMap::new(), &self.store)?;
        let initial = Commit {
            parents: vec![],
            timestamp_ms: now_ms,
            author: COMMITTER.to_string(),
            message: INITIAL_MESSAGE.to_string(),
            root_tree: empty,
        };
        let id = self.store.put_typed(&initial)?;

        self.refs.write_ref(MAIN, id)?;
        self.refs.attach_head()?;
        Ok(id)
    }

    /// Where HEAD points.
    pub fn head(&self) -> Result<Head> {
        self.refs.read_head()
    }

    /// Whether HEAD is parked on a historical commit.
    pub fn is_detached(&self) -> Result<bool> {
        Ok(matches!(self.refs.read_head()?, Head::Detached(_)))
    }

    /// Tip of the main line.
    pub fn main_id(&self) -> Result<ObjectId> {
        self.refs.read_ref(MAIN)
    }

    /// Loads a commit object.
    pub fn commit_object(&self, id: ObjectId) -> Result<Commit> {
        self.store.get_typed(id)
    }

    /// Parses a `historyRef` and checks that it names a readable commit.
    pub fn resolve(&self, history_ref: &str) -> Result<ObjectId> {
        let id = ObjectId::from_hex(history_ref)?;
        self.commit_object(id)?;
        Ok(id)
    }

    /// Absolute worktree path for a slash-separated repository path.
    pub fn worktree_path(&self, repo_path: &str) -> PathBuf {
        repo_path
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Commits the listed worktree paths on top of `refs/main`.
    ///
    /// Each path is read from the worktree and added to the parent's tree.
    /// Moving `refs/main` is the last step; any failure before it leaves the
    /// main line untouched.
    pub fn commit(&self, staged: &[String], message: &str, now_ms: i64) -> Result<ObjectId> {
        let deadline = Deadline::start("commit", self.timeout);

        if self.is_detached()? {
            return Err(CheckpointError::CommitFailed(
                "HEAD is detached; return to main before committing".to_string(),
            ));
        }

        let parent = self.main_id()?;
        let parent_commit = self.commit_object(parent)?;
        let mut paths = flatten_tree(parent_commit.root_tree, &self.store)?;

        for repo_path in staged {
            deadline.check()?;
            let bytes = fs::read(self.worktree_path(repo_path))?;
            insert_replacing(&mut paths, repo_path, self.store.put_blob(&bytes)?);
        }

        let root_tree = build_tree(&paths, &self.store)?;
        let commit = Commit {
            parents: vec![parent],
            timestamp_ms: now_ms,
            author: COMMITTER.to_string(),
            message: message.to_string(),
            root_tree,
        };
        let id = self.store.put_typed(&commit)?;

        deadline.check()?;
        self.refs.write_ref(MAIN, id)?;
        debug!(commit = %id, staged = staged.len(), "advanced main");
        Ok(id)
    }

    /// Moves `refs/main` back to `id`. Used to undo a commit whose
    /// checkpoint could not be recorded.
    pub fn reset_main(&self, id: ObjectId) -> Result<()> {
        self.commit_object(id)?;
        self.refs.write_ref(MAIN, id)
    }

    /// Parks HEAD on `id` and rewrites the worktree to that commit's tree.
    ///
    /// HEAD is written first so that a crash mid-checkout is visible as a
    /// detached HEAD on the next open.
    pub fn checkout_detached(&self, id: ObjectId) -> Result<()> {
        let deadline = Deadline::start("checkout", self.timeout);
        let commit = self.commit_object(id)?;
        self.refs.detach_head(id)?;
        self.materialize(commit.root_tree, &deadline)
    }

    /// Rewrites the worktree to the tip of main and re-attaches HEAD.
    ///
    /// HEAD is attached last, only after the worktree matches main.
    pub fn checkout_main(&self) -> Result<()> {
        let deadline = Deadline::start("checkout", self.timeout);
        let main = self.commit_object(self.main_id()?)?;
        self.materialize(main.root_tree, &deadline)?;
        self.refs.attach_head()
    }

    /// Rewrites the worktree to whatever HEAD currently shows.
    pub fn reset_worktree(&self) -> Result<()> {
        let deadline = Deadline::start("reset", self.timeout);
        let commit = self.commit_object(self.refs.resolve_head()?)?;
        self.materialize(commit.root_tree, &deadline)
    }

    /// Reads the bytes stored at `repo_path` in commit `id`, if present.
    pub fn read_path(&self, id: ObjectId, repo_path: &str) -> Result<Option<Vec<u8>>> {
        let commit = self.commit_object(id)?;
        match lookup_path(commit.root_tree, repo_path, &self.store)? {
            Some(blob) => self.store.get_blob(blob).map(Some),
            None => Ok(None),
        }
    }

    fn materialize(&self, tree: ObjectId, deadline: &Deadline) -> Result<()> {
        let wanted = flatten_tree(tree, &self.store)?;

        for dir in WORKTREE_DIRS {
            let dir_path = self.root.join(dir);
            fs::create_dir_all(&dir_path)?;
            self.remove_unwanted(&dir_path, dir, &wanted)?;
        }

        for (repo_path, blob) in &wanted {
            deadline.check()?;
            let target = self.worktree_path(repo_path);

            if let Ok(existing) = fs::read(&target) {
                if ObjectId::for_payload(ObjectKind::Blob, &existing) == *blob {
                    continue;
                }
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, self.store.get_blob(*blob)?)?;
        }

        Ok(())
    }

    /// Deletes worktree files absent from `wanted`, pruning emptied
    /// directories. Returns whether `dir` ended up empty.
    fn remove_unwanted(&self, dir: &Path, prefix: &str, wanted: &PathMap) -> Result<bool> {
        let mut empty = true;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let repo_path = format!("{}/{}", prefix, name);

            if entry.file_type()?.is_dir() {
                if self.remove_unwanted(&path, &repo_path, wanted)? {
                    fs::remove_dir(&path)?;
                } else {
                    empty = false;
                }
            } else if wanted.contains_key(&repo_path) {
                empty = false;
            } else {
                fs::remove_file(&path)?;
            }
        }

        Ok(empty)
    }
}
