//! Prune old checkpoints.

use super::Target;
use anyhow::Result;
use console::style;

/// Forget checkpoints older than `days` (or the configured default).
pub fn run(target: &Target, days: Option<u32>) -> Result<()> {
    let checkpoints = target.open()?;
    let removed = match days {
        Some(days) => checkpoints.clean(days),
        None => checkpoints.clean_default(),
    };

    if removed == 0 {
        println!("{} Nothing to clean", style("✓").green());
    } else {
        println!(
            "{} Removed {} checkpoint(s)",
            style("✓").green(),
            style(removed).yellow()
        );
    }

    Ok(())
}
