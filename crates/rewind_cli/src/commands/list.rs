//! List checkpoints.

use super::{format_time, Target};
use anyhow::Result;
use console::style;

pub fn run(target: &Target) -> Result<()> {
    let checkpoints = target.open()?;
    let listed = checkpoints.list_checkpoints();

    if listed.is_empty() {
        println!("No checkpoints");
        return Ok(());
    }

    for summary in &listed {
        println!(
            "{}  {}  {:<10} {:>3} file(s){}",
            style(&summary.id).cyan(),
            format_time(summary.timestamp),
            summary.operation,
            summary.file_count,
            if summary.has_snapshot { "  +snapshot" } else { "" }
        );
    }
    println!();
    println!("{} checkpoint(s)", listed.len());

    Ok(())
}
