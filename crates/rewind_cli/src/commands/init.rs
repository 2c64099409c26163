//! Create or open the shadow repository.

use super::Target;
use anyhow::{bail, Result};
use console::style;

/// Initialize checkpointing for the selected project.
pub fn run(target: &Target) -> Result<()> {
    let checkpoints = target.open()?;
    if !checkpoints.is_enabled() {
        bail!("Checkpointing could not be initialized (see warnings above)");
    }

    let stats = checkpoints.stats();
    println!("{} Checkpointing enabled", style("✓").green());
    if let Some(path) = &stats.shadow_repo_path {
        println!("  Shadow repository: {}", style(path.display()).cyan());
    }
    println!("  Checkpoints:       {}", stats.count);

    Ok(())
}
