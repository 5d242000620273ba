//! Delta Lake table backend

use super::{LoadSummary, Warehouse};
use crate::{CsvTable, WarehouseError};
use arrow_array::RecordBatch;
use arrow_schema::{ArrowError, DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use deltalake::DeltaOps;
use deltalake::operations::write::SchemaMode;
use deltalake::protocol::SaveMode;
use diagnostics::info;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// URL schemes deltalake opens without extra storage handlers
const SUPPORTED_SCHEMES: [&str; 2] = ["file", "memory"];

#[derive(Clone, Debug, Deserialize)]
pub struct DeltaConfig {
    /// Table location: a directory path, a `file://` URL or `memory://`
    pub uri: String,
}

impl DeltaConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Reject locations deltalake cannot open
    pub fn validate(&self) -> Result<(), String> {
        if self.uri.trim().is_empty() {
            return Err("delta table uri cannot be empty".to_string());
        }
        match self.scheme() {
            Some(scheme) if !SUPPORTED_SCHEMES.contains(&scheme) => Err(format!(
                "delta table uri {} uses unsupported scheme '{scheme}'; use a local path or file:// URL",
                self.uri
            )),
            _ => Ok(()),
        }
    }

    fn scheme(&self) -> Option<&str> {
        self.uri.split_once("://").map(|(scheme, _)| scheme)
    }

    fn local_dir(&self) -> Option<PathBuf> {
        if let Some(path) = self.uri.strip_prefix("file://") {
            Some(PathBuf::from(path))
        } else if self.uri.contains("://") {
            None
        } else {
            Some(PathBuf::from(&self.uri))
        }
    }
}

/// Writes each upload as a new version of a Delta table, replacing the
/// previous contents and schema
pub struct DeltaWarehouse {
    config: DeltaConfig,
}

impl DeltaWarehouse {
    pub fn new(config: DeltaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Warehouse for DeltaWarehouse {
    fn name(&self) -> &str {
        "Delta Lake"
    }

    fn table(&self) -> String {
        self.config.uri.clone()
    }

    async fn replace(&self, data: &CsvTable) -> Result<LoadSummary, WarehouseError> {
        self.config.validate().map_err(WarehouseError::Location)?;
        if let Some(dir) = self.config.local_dir() {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let batches = delta_compatible(data)?;
        let rows = data.num_rows();

        DeltaOps::try_from_uri(&self.config.uri)
            .await?
            .write(batches)
            .with_save_mode(SaveMode::Overwrite)
            .with_schema_mode(SchemaMode::Overwrite)
            .await?;

        let table = self.table();
        info!("Replaced Delta table {table} with {rows} rows", table, rows);
        Ok(LoadSummary { table, rows })
    }
}

/// Delta stores timestamps as microseconds in UTC
fn delta_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Timestamp(_, _) => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        DataType::Null => DataType::Utf8,
        other => other.clone(),
    }
}

fn delta_compatible(data: &CsvTable) -> Result<Vec<RecordBatch>, ArrowError> {
    let fields: Vec<Field> = data
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_data_type(delta_type(f.data_type())))
        .collect();
    let target = Arc::new(Schema::new(fields));

    data.batches()
        .iter()
        .map(|batch| {
            let columns = batch
                .columns()
                .iter()
                .zip(target.fields())
                .map(|(column, field)| {
                    if column.data_type() == field.data_type() {
                        Ok(column.clone())
                    } else {
                        arrow_cast::cast(column, field.data_type())
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            RecordBatch::try_new(target.clone(), columns)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, TimestampNanosecondArray};

    #[test]
    fn test_timestamps_become_utc_micros() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("at", DataType::Timestamp(TimeUnit::Nanosecond, None), true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(TimestampNanosecondArray::from(vec![1_000_000_000, 2_000_000_000])),
            ],
        )?;
        let table = CsvTable::from_batches(schema, vec![batch]);

        let converted = delta_compatible(&table)?;
        let converted_schema = converted[0].schema();
        assert_eq!(converted_schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(
            converted_schema.field(1).data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        );
        assert_eq!(converted[0].num_rows(), 2);
        Ok(())
    }

    #[test]
    fn test_local_dir_detection() {
        assert_eq!(
            DeltaConfig::new("/data/t").local_dir(),
            Some(PathBuf::from("/data/t"))
        );
        assert_eq!(
            DeltaConfig::new("file:///data/t").local_dir(),
            Some(PathBuf::from("/data/t"))
        );
        assert_eq!(DeltaConfig::new("s3://bucket/t").local_dir(), None);
    }

    #[test]
    fn test_location_schemes() {
        assert!(DeltaConfig::new("/data/t").validate().is_ok());
        assert!(DeltaConfig::new("file:///data/t").validate().is_ok());
        assert!(DeltaConfig::new("memory://t").validate().is_ok());
        assert!(DeltaConfig::new("").validate().is_err());
        for uri in ["s3://bucket/t", "gs://bucket/t", "abfss://c@a/t"] {
            let err = DeltaConfig::new(uri).validate().expect_err(uri);
            assert!(err.contains("unsupported scheme"), "{err}");
        }
    }

    #[tokio::test]
    async fn test_object_store_uri_fails_without_panicking() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(vec![1]))],
        )?;
        let table = CsvTable::from_batches(schema, vec![batch]);

        let warehouse = DeltaWarehouse::new(DeltaConfig::new("s3://bucket/table"));
        let result = warehouse.replace(&table).await;
        assert!(matches!(result, Err(WarehouseError::Location(_))));
        Ok(())
    }
}
