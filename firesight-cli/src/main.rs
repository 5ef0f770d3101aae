//! Firesight CLI - retrieve and cache satellite imagery.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::fetch::FetchArgs;

#[derive(Debug, Parser)]
#[command(name = "firesight", version = firesight::VERSION)]
#[command(about = "Resilient satellite imagery retrieval with persistent caching")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one satellite image, serving from cache when possible
    Fetch(FetchArgs),
    /// Inspect or clear the disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Cache directory (defaults to the user cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Cache size bound in MiB
        #[arg(long)]
        cache_max_mb: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _logging = firesight::logging::init_logging();

    let result = match cli.command {
        Command::Fetch(args) => commands::fetch::run(args).await,
        Command::Cache {
            action,
            cache_dir,
            cache_max_mb,
        } => commands::cache::run(action, cache_dir, cache_max_mb).await,
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}
