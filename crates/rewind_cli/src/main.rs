//! Rewind CLI - Command-line interface for project checkpoints.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Checkpoints and undo for tool-edited files", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root directory
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,
    /// State directory holding shadow repositories (overrides REWIND_HOME)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or open the shadow repository for the project
    Init,
    /// Record a checkpoint of the given files
    Create {
        /// Operation label (edit, write, ...)
        #[arg(long = "op")]
        operation: String,
        /// Snapshot to store alongside, as inline JSON
        #[arg(long, conflicts_with = "snapshot_file")]
        snapshot: Option<String>,
        /// Snapshot to store alongside, read from a file
        #[arg(long)]
        snapshot_file: Option<PathBuf>,
        /// Files to capture, relative to the project root
        files: Vec<PathBuf>,
    },
    /// Restore the files captured by a checkpoint
    Restore {
        /// Checkpoint ID (cp_...)
        id: String,
    },
    /// List checkpoints, oldest first
    List,
    /// Show one checkpoint and its snapshot
    Show {
        /// Checkpoint ID (cp_...)
        id: String,
    },
    /// Forget checkpoints older than a number of days
    Clean {
        /// Days to keep (defaults to retention.default_days)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Show checkpoint statistics
    Stats,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let target = commands::Target {
        project: cli.project,
        state_dir: cli.state_dir,
    };

    match cli.command {
        Commands::Init => commands::init::run(&target),
        Commands::Create {
            operation,
            snapshot,
            snapshot_file,
            files,
        } => commands::create::run(
            &target,
            &operation,
            snapshot.as_deref(),
            snapshot_file.as_deref(),
            &files,
        ),
        Commands::Restore { id } => commands::restore::run(&target, &id),
        Commands::List => commands::list::run(&target),
        Commands::Show { id } => commands::show::run(&target, &id),
        Commands::Clean { days } => commands::clean::run(&target, days),
        Commands::Stats => commands::stats::run(&target),
    }
}
