use crate::warehouse::{Warehouse, WarehouseConfig, build_warehouse};
use crate::{BlobKey, BlobStore, BlobStoreConfig, CsvOptions, CsvTable, IngestError, Result, ScratchFile};
use arrow_schema::ArrowError;
use bytes::Bytes;
use diagnostics::{debug, info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings for [`IngestBridge::from_config`]
#[derive(Clone, Debug, Deserialize)]
pub struct BridgeConfig {
    /// Directory for scratch copies of uploads (default: $TMPDIR/sluice)
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    pub blob_store: BlobStoreConfig,

    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub csv: CsvOptions,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("sluice")
}

/// Outcome of a successful ingest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub blob_key: String,
    pub bytes: usize,
    pub rows: usize,
    pub columns: Vec<String>,
    /// Warehouse product name, e.g. "BigQuery"
    pub warehouse: String,
    pub table: String,
}

impl IngestReceipt {
    /// Message shown on the upload page
    #[must_use]
    pub fn message(&self) -> String {
        format!("File uploaded and loaded to {}!", self.warehouse)
    }
}

/// Stores an upload, then loads it, strictly in that order
pub struct IngestBridge {
    scratch_dir: PathBuf,
    blobs: BlobStore,
    warehouse: Arc<dyn Warehouse>,
    csv: CsvOptions,
}

impl IngestBridge {
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        blobs: BlobStore,
        warehouse: Arc<dyn Warehouse>,
        csv: CsvOptions,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            blobs,
            warehouse,
            csv,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        config.csv.validate().map_err(IngestError::Configuration)?;
        let blobs = BlobStore::from_config(&config.blob_store)?;
        let warehouse = build_warehouse(&config.warehouse)?;
        Ok(Self::new(
            config.scratch_dir.clone(),
            blobs,
            warehouse,
            config.csv.clone(),
        ))
    }

    #[must_use]
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    #[must_use]
    pub fn warehouse(&self) -> &dyn Warehouse {
        self.warehouse.as_ref()
    }

    /// Store `data` under `filename` and replace the warehouse table with
    /// its rows
    pub async fn ingest(&self, filename: &str, data: Bytes) -> Result<IngestReceipt> {
        let key = BlobKey::parse(filename)?;
        if data.is_empty() {
            return Err(IngestError::EmptyUpload);
        }

        let scratch = {
            let dir = self.scratch_dir.clone();
            let data = data.clone();
            tokio::task::spawn_blocking(move || ScratchFile::create(&dir, &data))
                .await?
                .map_err(IngestError::Scratch)?
        };
        let scratch_path = scratch.path().display().to_string();
        debug!("Wrote upload {key} to {scratch_path}", key: key.as_str(), scratch_path);

        let contents = scratch.read().await.map_err(IngestError::Scratch)?;
        let bytes = contents.len();
        self.blobs
            .put(&key, contents)
            .await
            .map_err(|source| IngestError::Store {
                key: key.to_string(),
                store: self.blobs.url().to_string(),
                source,
            })?;
        info!("Stored {key} ({bytes} bytes) in {store}", key: key.as_str(), bytes, store: self.blobs.url());

        let parsed = {
            let path = scratch.path().to_path_buf();
            let options = self.csv.clone();
            tokio::task::spawn_blocking(move || CsvTable::read(&path, &options)).await?
        };
        let table = parsed
            .and_then(|table| {
                if table.num_columns() == 0 {
                    Err(ArrowError::CsvError("no columns in header row".to_string()))
                } else {
                    Ok(table)
                }
            })
            .map_err(|source| IngestError::Parse {
                key: key.to_string(),
                source,
            })?;

        let summary = self
            .warehouse
            .replace(&table)
            .await
            .map_err(|source| IngestError::Load {
                key: key.to_string(),
                warehouse: self.warehouse.name().to_string(),
                source,
            })?;

        if let Err(e) = scratch.remove() {
            let error = e.to_string();
            warn!("Failed to remove scratch file {scratch_path}: {error}", scratch_path, error);
        }

        Ok(IngestReceipt {
            blob_key: key.to_string(),
            bytes,
            rows: summary.rows,
            columns: table.column_names(),
            warehouse: self.warehouse.name().to_string(),
            table: summary.table,
        })
    }
}
