//! Restore a checkpoint.

use super::Target;
use anyhow::{bail, Result};
use console::style;

/// Write the files captured by checkpoint `id` back into the project.
pub fn run(target: &Target, id: &str) -> Result<()> {
    let checkpoints = target.open()?;
    let Some(report) = checkpoints.restore_with_report(id) else {
        bail!("Checkpoint {} was not restored (see warnings above)", id);
    };

    println!(
        "{} Restored checkpoint {}",
        style("✓").green(),
        style(&report.checkpoint_id).cyan()
    );
    for path in &report.restored {
        println!("  {} {}", style("✓").green(), path);
    }
    for path in &report.missing {
        println!("  {} {} (not in checkpoint)", style("?").yellow(), path);
    }
    for (path, error) in &report.failed {
        println!("  {} {}: {}", style("×").red(), path, error);
    }

    if report.is_partial() {
        println!();
        println!(
            "{} Partial restore: {} of {} file(s) written",
            style("!").yellow(),
            report.restored.len(),
            report.restored.len() + report.missing.len() + report.failed.len()
        );
    }

    Ok(())
}
