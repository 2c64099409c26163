//! Rewind Core Library
//!
//! Checkpoint and undo support for tools that edit files in a project:
//! - Per-project shadow repositories kept outside the project
//! - Content-addressed, versioned file history
//! - Atomic checkpoints with optional opaque snapshots
//! - Best-effort restore that never rewinds history
//!
//! # Quick Start
//!
//! ```
//! use rewind_core::{Checkpoints, Config};
//! use std::fs;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let project = tmp.path().join("project");
//! fs::create_dir(&project).unwrap();
//! fs::write(project.join("a.txt"), "v1").unwrap();
//!
//! let mut checkpoints = Checkpoints::new(&project, Config::with_state_dir(tmp.path().join("state")));
//! assert!(checkpoints.initialize());
//!
//! let id = checkpoints.create("edit", &["a.txt"], None).unwrap();
//! fs::write(project.join("a.txt"), "v2").unwrap();
//!
//! assert!(checkpoints.restore(&id));
//! assert_eq!(fs::read_to_string(project.join("a.txt")).unwrap(), "v1");
//! ```
//!
//! # Features
//!
//! ## Content-Addressed Storage
//!
//! File contents are stored using BLAKE3 content hashing with zstd
//! compression, so unchanged files cost nothing across checkpoints:
//!
//! ```
//! use rewind_core::ObjectStore;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = ObjectStore::new(tmp.path().join("objects"));
//!
//! let id1 = store.put_blob(b"content").unwrap();
//! let id2 = store.put_blob(b"content").unwrap();
//! assert_eq!(id1, id2);
//! assert_eq!(store.get_blob(id1).unwrap(), b"content");
//! ```
//!
//! ## Snapshots
//!
//! A checkpoint can carry an opaque blob, typically the conversation state
//! at the time of the edit. It is stored and returned byte for byte:
//!
//! ```
//! use rewind_core::{Checkpoints, Config, Snapshot};
//! use serde_json::json;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut checkpoints = Checkpoints::new(tmp.path(), Config::with_state_dir(tmp.path().join(".state")));
//! checkpoints.initialize();
//!
//! let snapshot = Snapshot::from_json(&json!({"turn": 3})).unwrap();
//! let id = checkpoints.create::<&str>("edit", &[], Some(&snapshot)).unwrap();
//!
//! let detail = checkpoints.show(&id).unwrap();
//! assert_eq!(detail.snapshot, Some(snapshot));
//! ```

mod checkpoints;
mod config;
mod error;
mod fs_util;
mod history;
mod identity;
mod lock;
mod metadata;
mod object_id;
mod object_store;
mod recorder;
mod refs;
mod restore;
mod retention;
mod shadow;
mod snapshot;
mod tree;
mod types;

pub use checkpoints::{CheckpointDetail, CheckpointSummary, Checkpoints, Stats};
pub use config::{
    Config, HistoryConfig, LockConfig, RetentionConfig, StorageConfig, CONFIG_FILE, STATE_DIR_ENV,
};
pub use error::{CheckpointError, Result};
pub use history::{Deadline, History, FILES_DIR, SNAPSHOTS_DIR};
pub use identity::ProjectIdentity;
pub use lock::{LockGuard, LOCK_FILE};
pub use metadata::{Checkpoint, Metadata, MetadataStore, METADATA_FILE};
pub use object_id::ObjectId;
pub use object_store::{ObjectStore, DEFAULT_COMPRESSION_LEVEL};
pub use recorder::{CheckpointRecorder, CHECKPOINT_ID_PREFIX};
pub use refs::{Head, Refs, MAIN};
pub use restore::{RestoreEngine, RestoreReport};
pub use retention::RetentionManager;
pub use shadow::{RecoverySummary, RepositoryState, ShadowRepository, ShadowRepositoryManager};
pub use snapshot::Snapshot;
pub use tree::{build_tree, flatten_tree, lookup_path, PathMap};
pub use types::*;

/// Time provider trait for testing.
///
/// Allows injecting controlled time so retention windows and checkpoint ids
/// can be tested deterministically. Only used when explicitly set via
/// `with_time_provider()`; otherwise the system clock is read.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in milliseconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}
