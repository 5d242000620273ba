//! Warehouse tables that receive each upload
//!
//! Every backend implements full replacement: after a successful
//! [`Warehouse::replace`] the table holds exactly the uploaded rows, with
//! the uploaded schema. There is no append mode.

mod bigquery;
mod delta;

pub use bigquery::{BigQueryConfig, BigQueryWarehouse};
pub use delta::{DeltaConfig, DeltaWarehouse};

use crate::{CsvTable, IngestError, WarehouseError};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

/// What a completed load reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Table identifier as the backend names it
    pub table: String,
    pub rows: usize,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Product name shown to users, e.g. "BigQuery"
    fn name(&self) -> &str;

    /// The target table, for logs and receipts
    fn table(&self) -> String;

    /// Replace the table's contents and schema with `data`
    async fn replace(&self, data: &CsvTable) -> Result<LoadSummary, WarehouseError>;
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WarehouseConfig {
    Delta(DeltaConfig),
    #[serde(alias = "big_query")]
    Bigquery(BigQueryConfig),
}

pub fn build_warehouse(config: &WarehouseConfig) -> Result<Arc<dyn Warehouse>, IngestError> {
    match config {
        WarehouseConfig::Delta(delta) => {
            delta.validate().map_err(IngestError::Configuration)?;
            Ok(Arc::new(DeltaWarehouse::new(delta.clone())))
        }
        WarehouseConfig::Bigquery(bq) => Ok(Arc::new(BigQueryWarehouse::new(bq.clone())?)),
    }
}

pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_duration::parse(&text)
        .map_err(|e| serde::de::Error::custom(format!("invalid duration '{text}': {e}")))
}
