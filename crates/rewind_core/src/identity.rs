//! Stable per-project identity used to pick the shadow repository.

use crate::error::{CheckpointError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Hex characters of the path hash used as the directory name.
const HASH_LEN: usize = 16;

/// A project's canonical path and the hash derived from it.
///
/// The hash is a truncated BLAKE3 digest of the canonical absolute path, so
/// the same directory maps to the same shadow repository across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    path: PathBuf,
    hash: String,
}

impl ProjectIdentity {
    /// Canonicalizes `project_dir` and derives its hash.
    ///
    /// # Errors
    ///
    /// Fails if the directory does not exist or is not a directory.
    pub fn resolve(project_dir: &Path) -> Result<Self> {
        let path = fs::canonicalize(project_dir)?;
        if !path.is_dir() {
            return Err(CheckpointError::InvalidPath {
                path,
                reason: "project root is not a directory".to_string(),
            });
        }
        Ok(Self::from_canonical(path))
    }

    fn from_canonical(path: PathBuf) -> Self {
        let digest = blake3::hash(path.to_string_lossy().as_bytes());
        let hash = digest.to_hex()[..HASH_LEN].to_string();
        Self { path, hash }
    }

    /// Canonical absolute project path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name under `<state_dir>/history/`.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `<state_dir>/history/<hash>`.
    pub fn shadow_dir(&self, state_dir: &Path) -> PathBuf {
        state_dir.join("history").join(&self.hash)
    }
}
