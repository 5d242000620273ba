//! Ingest bridge: uploaded CSV → object store → warehouse table
//!
//! One upload is handled start to finish by [`IngestBridge::ingest`]:
//!
//! 1. The filename is validated as a blob key ([`BlobKey`]).
//! 2. The bytes are written to an opaque scratch file ([`ScratchFile`]).
//! 3. The scratch bytes are stored in the [`BlobStore`] under the key,
//!    replacing any previous blob of that name.
//! 4. The scratch file is parsed into a [`CsvTable`] with inferred column types.
//! 5. The [`Warehouse`] table is replaced with the parsed rows.
//!
//! The scratch file is removed when the ingest returns, whichever way it
//! returns. The store always happens before the load; if it fails the
//! warehouse is never touched. Nothing is retried and nothing spans the two
//! systems: a load failure leaves the new blob in place, and the returned
//! [`IngestError`] says so.
//!
//! # Backends
//!
//! - Blob stores: `gs://bucket`, `s3://bucket`, `memory://`, `file:///dir`
//! - Warehouses: Delta Lake table ([`DeltaWarehouse`]), BigQuery load job
//!   ([`BigQueryWarehouse`])
//!
//! # Usage
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use bridge::{BlobStore, CsvOptions, DeltaConfig, DeltaWarehouse, IngestBridge};
//! use std::sync::Arc;
//!
//! let bridge = IngestBridge::new(
//!     "/tmp/sluice",
//!     BlobStore::from_url("memory://")?,
//!     Arc::new(DeltaWarehouse::new(DeltaConfig::new("/data/uploads"))),
//!     CsvOptions::default(),
//! );
//! let receipt = bridge.ingest("readings.csv", "a,b\n1,2\n".into()).await?;
//! println!("{}", receipt.message());
//! # Ok(())
//! # }
//! ```

mod blob;
mod bridge;
mod csv;
mod error;
mod key;
mod scratch;
pub mod warehouse;

pub use blob::{BlobStore, BlobStoreConfig};
pub use bridge::{BridgeConfig, IngestBridge, IngestReceipt};
pub use csv::{CsvOptions, CsvTable};
pub use error::{IngestError, WarehouseError};
pub use key::{BlobKey, MAX_KEY_LEN};
pub use scratch::ScratchFile;
pub use warehouse::{
    BigQueryConfig, BigQueryWarehouse, DeltaConfig, DeltaWarehouse, LoadSummary, Warehouse,
    WarehouseConfig, build_warehouse,
};

/// Result type for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;
