//! CLI type definitions
//!
//! Top-level clap parser. Each command's arguments live next to its
//! implementation under `commands/`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::blob::BlobArgs;
use super::commands::init::InitArgs;
use super::commands::trace::TraceArgs;
use super::commands::worker::WorkerArgs;

#[derive(Parser, Debug)]
#[command(name = "tracesmith")]
#[command(about = "Bug-fix trace ingestion and automated QA", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of `.tracesmith/`
    #[arg(short, long, global = true, env = "TRACESMITH_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the project directory, default config and database
    Init(InitArgs),

    /// Create, append to, finalize and inspect traces
    Trace(TraceArgs),

    /// Upload and download content-addressed blobs
    Blob(BlobArgs),

    /// Run the QA pipeline worker
    Worker(WorkerArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tracesmith", "worker", "run", "--drain", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Worker(_)));
    }
}
