//! HEAD and `refs/main` for the shadow history.

use crate::error::{CheckpointError, Result};
use crate::fs_util::write_atomic;
use crate::ObjectId;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the main line ref.
pub const MAIN: &str = "main";

const ATTACHED_PREFIX: &str = "ref: ";

/// Where HEAD currently points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Head {
    /// HEAD follows `refs/main`.
    Attached,
    /// HEAD is parked on a historical commit (restore in progress).
    Detached(ObjectId),
}

/// Manages the HEAD and main refs of one shadow repository.
///
/// Named refs are single-line files holding a hex ObjectId. HEAD holds either
/// `ref: main` or a hex id. Every write is atomic (temp file + rename).
pub struct Refs {
    root: PathBuf,
}

impl Refs {
    /// Creates a new Refs manager for the given shadow repository root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Reads HEAD.
    ///
    /// # Errors
    ///
    /// Returns `RefNotFound` if HEAD doesn't exist and `InvalidRef` if it is
    /// neither a symbolic ref to main nor a commit id.
    pub fn read_head(&self) -> Result<Head> {
        let path = self.head_path();
        let content = read_ref_text(&path, "HEAD")?;

        if let Some(target) = content.strip_prefix(ATTACHED_PREFIX) {
            if target.trim() == MAIN {
                return Ok(Head::Attached);
            }
            return Err(CheckpointError::InvalidRef {
                path,
                reason: format!("HEAD points at unknown ref '{}'", target.trim()),
            });
        }

        parse_id(&path, &content).map(Head::Detached)
    }

    /// Points HEAD back at `refs/main`.
    pub fn attach_head(&self) -> Result<()> {
        write_atomic(
            &self.head_path(),
            format!("{}{}\n", ATTACHED_PREFIX, MAIN).as_bytes(),
        )
    }

    /// Parks HEAD on a specific commit.
    pub fn detach_head(&self, id: ObjectId) -> Result<()> {
        write_atomic(&self.head_path(), format!("{}\n", id.as_hex()).as_bytes())
    }

    /// Resolves HEAD to the commit it currently shows.
    pub fn resolve_head(&self) -> Result<ObjectId> {
        match self.read_head()? {
            Head::Attached => self.read_ref(MAIN),
            Head::Detached(id) => Ok(id),
        }
    }

    /// Reads a named reference.
    pub fn read_ref(&self, name: &str) -> Result<ObjectId> {
        let path = self.ref_path(name);
        let content = read_ref_text(&path, name)?;
        parse_id(&path, &content)
    }

    /// Writes a named reference atomically, creating `refs/` as needed.
    pub fn write_ref(&self, name: &str, id: ObjectId) -> Result<()> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, format!("{}\n", id.as_hex()).as_bytes())
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join("refs").join(name)
    }
}

fn read_ref_text(path: &Path, name: &str) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CheckpointError::RefNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_id(path: &Path, content: &str) -> Result<ObjectId> {
    ObjectId::from_hex(content).map_err(|e| CheckpointError::InvalidRef {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
