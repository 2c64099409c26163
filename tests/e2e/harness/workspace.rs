use anyhow::{Context, Result};
use rewind_core::{Checkpoints, Config, LockConfig};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Manages isolated test environments with tempfile
///
/// Layout: `<tmp>/project` is the edited project, `<tmp>/state` holds the
/// shadow repositories.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        fs::create_dir_all(dir.path().join("project"))?;
        Ok(Self { dir })
    }

    /// Create workspace with initial files
    pub fn with_files(files: HashMap<String, Vec<u8>>) -> Result<Self> {
        let workspace = Self::empty()?;
        for (path, content) in files {
            workspace.write_file(&path, &content)?;
        }
        Ok(workspace)
    }

    /// Copy a fixture from `tests/fixtures/<name>` into the project
    pub fn load_fixture(&self, name: &str) -> Result<()> {
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name);

        if !fixture_path.exists() {
            anyhow::bail!("Fixture not found: {}", fixture_path.display());
        }

        copy_dir_recursive(&fixture_path, &self.project())
    }

    /// Project root
    pub fn project(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    /// State directory handed to the checkpoint config
    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Put a regular file where the state directory should be, so that
    /// initialization cannot create anything there.
    pub fn block_state_dir(&self) -> Result<()> {
        fs::write(self.state_dir(), b"not a directory").context("Failed to block state dir")
    }

    /// Config rooted at this workspace, with short lock backoff
    pub fn config(&self) -> Config {
        let mut config = Config::with_state_dir(self.state_dir());
        config.lock = LockConfig {
            retries: 2,
            backoff_ms: 5,
        };
        config
    }

    /// Build (but don't initialize) checkpoints for the project
    pub fn checkpoints(&self) -> Checkpoints {
        Checkpoints::new(self.project(), self.config())
    }

    /// Write file to the project
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.project().join(path);

        // Create parent directories
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", path))?;
        }

        fs::write(&full_path, content)
            .with_context(|| format!("Failed to write file: {}", path))?;

        Ok(())
    }

    /// Remove a project file
    pub fn delete_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.project().join(path))
            .with_context(|| format!("Failed to delete file: {}", path))
    }

    /// Read file from the project
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.project().join(path);
        fs::read(&full_path).with_context(|| format!("Failed to read file: {}", path))
    }

    /// Check if file exists
    pub fn file_exists(&self, path: &str) -> bool {
        self.project().join(path).exists()
    }
}

/// Recursively copy directory contents
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
