//! Small filesystem helpers shared by the store, refs and metadata.

use crate::error::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes `contents` to `path` so readers see either the old or the new file.
///
/// The bytes go to `<path>.tmp` in the same directory, are fsynced, and the
/// temp file is renamed over the target. The parent directory is fsynced on
/// Unix so the rename itself survives a crash.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");

    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        // Don't leave a half-written temp file behind. If tmp_path is not a
        // regular file this fails too, which is fine.
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }

    Ok(())
}
