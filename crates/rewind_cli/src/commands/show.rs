//! Show one checkpoint.

use super::{format_time, Target};
use anyhow::{bail, Result};
use console::style;

pub fn run(target: &Target, id: &str) -> Result<()> {
    let checkpoints = target.open()?;
    let Some(detail) = checkpoints.show(id) else {
        bail!("Unknown checkpoint: {}", id);
    };
    let checkpoint = &detail.checkpoint;

    println!("{}", style(&checkpoint.id).cyan().bold());
    println!("  Operation: {}", checkpoint.operation);
    println!("  Created:   {}", format_time(checkpoint.timestamp));
    println!("  History:   {}", &checkpoint.history_ref[..12.min(checkpoint.history_ref.len())]);
    println!("  Files:");
    for file in &checkpoint.files {
        println!("    {}", file);
    }

    match &detail.snapshot {
        Some(snapshot) => {
            println!("  Snapshot:");
            // Snapshots are opaque; pretty-print only when they happen to be JSON.
            let rendered = match serde_json::from_slice::<serde_json::Value>(snapshot.as_bytes()) {
                Ok(value) => serde_json::to_string_pretty(&value)?,
                Err(_) => String::from_utf8_lossy(snapshot.as_bytes()).into_owned(),
            };
            for line in rendered.lines() {
                println!("    {}", line);
            }
        }
        None if checkpoint.has_snapshot => {
            println!("  Snapshot:  {}", style("unreadable").yellow());
        }
        None => {}
    }

    Ok(())
}
