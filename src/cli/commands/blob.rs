//! Blob CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use super::read_input;
use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::domain::models::BlobRef;

#[derive(Args, Debug)]
pub struct BlobArgs {
    #[command(subcommand)]
    pub command: BlobCommands,
}

#[derive(Subcommand, Debug)]
pub enum BlobCommands {
    /// Redact and store a file, printing its blob reference
    Put {
        /// File to upload, or `-` for stdin
        file: PathBuf,
        /// MIME type recorded with the blob
        #[arg(short = 't', long)]
        content_type: Option<String>,
    },
    /// Fetch a blob's bytes
    Get {
        /// Blob id (`sha256:<hex>`)
        blob_id: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the stored reference instead of the bytes
        #[arg(long)]
        metadata: bool,
    },
}

impl CommandOutput for BlobRef {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Blob:         {}", self.blob_id),
            format!("Content type: {}", self.content_type),
            format!("Bytes:        {}", self.byte_length),
            format!("Stored at:    {}", self.storage_uri),
        ];
        if let Some(redaction) = self.redaction.as_ref().filter(|r| r.applied) {
            let rules: Vec<&str> = redaction.rules.iter().map(|r| r.as_str()).collect();
            lines.push(format!("Redacted by:  {}", rules.join(", ")));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: BlobArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    match args.command {
        BlobCommands::Put { file, content_type } => {
            let data = read_input(&file).await?;
            let blob = ctx.ingestion.upload_blob(&data, content_type.as_deref()).await?;
            output(&blob, json_mode);
        }
        BlobCommands::Get { blob_id, metadata: true, .. } => {
            let blob = ctx.ingestion.blob_metadata(&blob_id).await?;
            output(&blob, json_mode);
        }
        BlobCommands::Get { blob_id, output: Some(path), .. } => {
            let data = ctx.ingestion.get_blob(&blob_id).await?;
            tokio::fs::write(&path, &data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let blob = ctx.ingestion.blob_metadata(&blob_id).await?;
            output(&blob, json_mode);
        }
        BlobCommands::Get { blob_id, output: None, .. } => {
            let data = ctx.ingestion.get_blob(&blob_id).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data).context("Failed to write blob to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
