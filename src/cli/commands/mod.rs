//! CLI command implementations.

pub mod blob;
pub mod init;
pub mod trace;
pub mod worker;

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read a file, or stdin when `path` is `-`.
pub(crate) async fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Read a JSON request body from a file or stdin.
pub(crate) async fn read_json_input(path: &Path) -> Result<serde_json::Value> {
    let bytes = read_input(path).await?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not valid JSON", path.display()))
}
