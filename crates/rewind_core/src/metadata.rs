//! The `metadata.json` checkpoint index.

use crate::error::{CheckpointError, Result};
use crate::fs_util::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name of the index inside the shadow repository.
pub const METADATA_FILE: &str = "metadata.json";

/// One recorded checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// `cp_<unix-ms>_<random>`, unique and immutable.
    pub id: String,
    /// Hex id of the shadow commit holding this checkpoint.
    pub history_ref: String,
    /// Short label supplied by the caller ("edit", "write", ...).
    pub operation: String,
    /// Project-relative paths actually captured, in capture order.
    pub files: Vec<String>,
    /// When the checkpoint was created.
    pub timestamp: DateTime<Utc>,
    /// Whether `snapshots/<id>.json` was stored alongside.
    pub has_snapshot: bool,
}

/// The whole index for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Absolute path of the project this index belongs to.
    pub project_path: PathBuf,
    /// When the shadow repository was created.
    pub created: DateTime<Utc>,
    /// Checkpoints, oldest first.
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

impl Metadata {
    /// An empty index for `project_path`.
    pub fn new(project_path: impl Into<PathBuf>, created: DateTime<Utc>) -> Self {
        Self {
            project_path: project_path.into(),
            created,
            checkpoints: Vec::new(),
        }
    }

    /// Finds a checkpoint by id.
    pub fn find(&self, id: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.id == id)
    }

    /// Whether an id is already taken.
    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }
}

/// Loads and saves `metadata.json` for one shadow repository.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    /// Creates a store for the index inside `repo_dir`.
    pub fn new(repo_dir: &Path) -> Self {
        Self {
            path: repo_dir.join(METADATA_FILE),
        }
    }

    /// Path of `metadata.json`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the index file exists yet.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the index.
    ///
    /// A missing file yields a fresh empty index. An unreadable or
    /// unparseable file is logged, copied aside to `metadata.json.bak`, and
    /// replaced by an empty index; this never fails on corrupt content.
    pub fn load(&self, project_path: &Path, now: DateTime<Utc>) -> Result<Metadata> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Metadata::new(project_path, now));
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Metadata>(&bytes) {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Checkpoint metadata is corrupt, starting with an empty index"
                );
                let backup = self.path.with_extension("json.bak");
                if let Err(copy_err) = fs::write(&backup, &bytes) {
                    warn!(error = %copy_err, "Could not preserve corrupt metadata");
                }
                Ok(Metadata::new(project_path, now))
            }
        }
    }

    /// Writes the index via temp file + rename so a crash mid-write leaves
    /// the previous version intact.
    pub fn save(&self, metadata: &Metadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| CheckpointError::MetadataError(e.to_string()))?;
        write_atomic(&self.path, &json)
    }
}
