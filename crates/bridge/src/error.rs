//! Error types for the ingest bridge

use arrow_schema::ArrowError;
use std::time::Duration;
use thiserror::Error;

/// Why an upload did not make it into the warehouse
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid filename {filename:?}: {reason}")]
    InvalidFilename {
        filename: String,
        reason: &'static str,
    },

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Scratch file error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Failed to store {key} in {store}: {source}")]
    Store {
        key: String,
        store: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Stored {key} but could not parse it as CSV: {source}")]
    Parse {
        key: String,
        #[source]
        source: ArrowError,
    },

    #[error("Stored {key} but loading {warehouse} failed: {source}")]
    Load {
        key: String,
        warehouse: String,
        #[source]
        source: WarehouseError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Background task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl IngestError {
    /// The upload itself was at fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidFilename { .. }
                | IngestError::EmptyUpload
                | IngestError::Parse { .. }
        )
    }

    /// Blob key written before the failure, if the store step succeeded
    #[must_use]
    pub fn stored_key(&self) -> Option<&str> {
        match self {
            IngestError::Parse { key, .. } | IngestError::Load { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Delta Lake error: {0}")]
    Delta(#[from] deltalake::DeltaTableError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Load job {job_id} failed: {message}")]
    Job { job_id: String, message: String },

    #[error("Load job {job_id} not done after {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("Unsupported table location: {0}")]
    Location(String),

    #[error("Access token unavailable: {0}")]
    Token(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
