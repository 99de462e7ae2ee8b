//! Worker CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(subcommand)]
    pub command: WorkerCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommands {
    /// Process queued QA jobs
    Run {
        /// Exit once the queue is empty instead of polling
        #[arg(long)]
        drain: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct WorkerRunOutput {
    pub jobs_processed: Option<usize>,
    pub message: String,
}

impl CommandOutput for WorkerRunOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: WorkerArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let WorkerCommands::Run { drain } = args.command;
    let worker = ctx.worker()?;

    if drain {
        let processed = worker.run_until_idle().await?;
        let output_data = WorkerRunOutput {
            jobs_processed: Some(processed),
            message: format!("Processed {processed} job(s); queue is empty."),
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested; finishing current job"),
            Err(e) => warn!(error = %e, "Failed to listen for ctrl-c"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await.context("Worker loop failed")?;

    let output_data = WorkerRunOutput {
        jobs_processed: None,
        message: "Worker stopped.".to_string(),
    };
    output(&output_data, json_mode);
    Ok(())
}
