//! Checkpoint statistics.

use super::{format_time, Target};
use anyhow::Result;
use console::style;

pub fn run(target: &Target) -> Result<()> {
    let checkpoints = target.open()?;
    let stats = checkpoints.stats();

    println!("{}", style("Checkpoint Statistics:").bold());
    println!(
        "  Enabled:     {}",
        if stats.enabled {
            style("yes").green()
        } else {
            style("no").red()
        }
    );
    println!("  Checkpoints: {}", style(stats.count).cyan());
    if let Some(oldest) = stats.oldest {
        println!("  Oldest:      {}", format_time(oldest));
    }
    if let Some(newest) = stats.newest {
        println!("  Newest:      {}", format_time(newest));
    }
    if let Some(path) = &stats.shadow_repo_path {
        println!("  Repository:  {}", path.display());
    }

    Ok(())
}
