use crate::config::SluiceConfig;
use anyhow::{Context, Result, anyhow};
use bridge::{IngestBridge, IngestReceipt};
use bytes::Bytes;
use std::path::Path;

/// Run one file through the same store-then-load path as the upload form
#[allow(clippy::print_stdout)]
pub async fn ingest_command(
    config: &SluiceConfig,
    path: &Path,
    name: Option<&str>,
) -> Result<IngestReceipt> {
    let bridge = IngestBridge::from_config(&config.bridge)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot take a file name from {}", path.display()))?,
    };
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let receipt = bridge.ingest(&name, Bytes::from(data)).await?;
    println!("{}", receipt.message());
    println!(
        "  {} rows, {} columns ({}) into {}",
        receipt.rows,
        receipt.columns.len(),
        receipt.columns.join(", "),
        receipt.table
    );
    Ok(receipt)
}
