//! Record a checkpoint.

use super::Target;
use anyhow::{bail, Context, Result};
use console::style;
use rewind_core::Snapshot;
use std::fs;
use std::path::{Path, PathBuf};

/// Capture `files` under `operation`, with an optional snapshot.
pub fn run(
    target: &Target,
    operation: &str,
    snapshot_json: Option<&str>,
    snapshot_file: Option<&Path>,
    files: &[PathBuf],
) -> Result<()> {
    let snapshot = match (snapshot_json, snapshot_file) {
        (Some(json), _) => {
            let value: serde_json::Value =
                serde_json::from_str(json).context("--snapshot is not valid JSON")?;
            Some(Snapshot::from_json(&value)?)
        }
        (None, Some(path)) => {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
            Some(Snapshot::from_bytes(bytes))
        }
        (None, None) => None,
    };

    let checkpoints = target.open()?;
    let Some(id) = checkpoints.create(operation, files, snapshot.as_ref()) else {
        bail!("No checkpoint was created (see warnings above)");
    };

    println!("{} Created checkpoint {}", style("✓").green(), style(&id).cyan());
    if let Some(detail) = checkpoints.show(&id) {
        for file in &detail.checkpoint.files {
            println!("  {}", file);
        }
        let skipped = files.len().saturating_sub(detail.checkpoint.files.len());
        if skipped > 0 {
            println!(
                "  {} {} path(s) skipped",
                style("!").yellow(),
                skipped
            );
        }
    }

    Ok(())
}
