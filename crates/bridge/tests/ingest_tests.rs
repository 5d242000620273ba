use anyhow::Result;
use arrow_array::RecordBatch;
use async_trait::async_trait;
use bridge::{
    BlobKey, BlobStore, CsvOptions, CsvTable, DeltaConfig, DeltaWarehouse, IngestBridge,
    IngestError, LoadSummary, Warehouse, WarehouseError,
};
use bytes::Bytes;
use datafusion::prelude::SessionContext;
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

const THREE_ROWS: &str = "a,b\n1,2\n3,4\n5,6\n";

/// Counts loads and optionally fails them
#[derive(Default)]
struct RecordingWarehouse {
    loads: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn table(&self) -> String {
        "recorder".to_string()
    }

    async fn replace(&self, data: &CsvTable) -> Result<LoadSummary, WarehouseError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WarehouseError::Job {
                job_id: "job-1".to_string(),
                message: "table is locked".to_string(),
            });
        }
        Ok(LoadSummary {
            table: self.table(),
            rows: data.num_rows(),
        })
    }
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

async fn read_table(uri: &str) -> Result<Vec<RecordBatch>> {
    let table = deltalake::open_table(uri).await?;
    let ctx = SessionContext::new();
    ctx.register_table("uploads", Arc::new(table))?;
    Ok(ctx
        .sql("SELECT * FROM uploads ORDER BY 1")
        .await?
        .collect()
        .await?)
}

fn pretty(batches: &[RecordBatch]) -> Result<String> {
    Ok(arrow_cast::pretty::pretty_format_batches(batches)?.to_string())
}

#[tokio::test]
async fn test_three_row_upload_lands_in_store_and_delta_table() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse_dir = tempdir()?;
    let table_uri = warehouse_dir.path().join("uploads").to_string_lossy().to_string();
    let memory = Arc::new(InMemory::new());

    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::new(memory.clone(), "memory://"),
        Arc::new(DeltaWarehouse::new(DeltaConfig::new(&table_uri))),
        CsvOptions::default(),
    );

    let receipt = bridge.ingest("data.csv", Bytes::from_static(THREE_ROWS.as_bytes())).await?;
    assert_eq!(receipt.message(), "File uploaded and loaded to Delta Lake!");
    assert_eq!(receipt.rows, 3);
    assert_eq!(receipt.bytes, THREE_ROWS.len());
    assert_eq!(receipt.columns, vec!["a", "b"]);
    assert_eq!(receipt.blob_key, "data.csv");

    // Blob is byte-identical
    let stored = memory
        .get(&object_store::path::Path::from("data.csv"))
        .await?
        .bytes()
        .await?;
    assert_eq!(stored, Bytes::from_static(THREE_ROWS.as_bytes()));

    let batches = read_table(&table_uri).await?;
    assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 3);
    assert_eq!(
        pretty(&batches)?,
        "+---+---+\n\
         | a | b |\n\
         +---+---+\n\
         | 1 | 2 |\n\
         | 3 | 4 |\n\
         | 5 | 6 |\n\
         +---+---+"
    );

    assert_eq!(entries(scratch.path()), 0, "scratch file must be removed");
    Ok(())
}

#[tokio::test]
async fn test_repeated_upload_replaces_table() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse_dir = tempdir()?;
    let table_uri = warehouse_dir.path().to_string_lossy().to_string();
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::from_url("memory://")?,
        Arc::new(DeltaWarehouse::new(DeltaConfig::new(&table_uri))),
        CsvOptions::default(),
    );

    bridge.ingest("data.csv", Bytes::from_static(THREE_ROWS.as_bytes())).await?;
    let once = pretty(&read_table(&table_uri).await?)?;

    bridge.ingest("data.csv", Bytes::from_static(THREE_ROWS.as_bytes())).await?;
    let twice = pretty(&read_table(&table_uri).await?)?;
    assert_eq!(once, twice);

    // A different file replaces rows and schema
    bridge
        .ingest("other.csv", Bytes::from_static(b"name,score\nann,9.5\n"))
        .await?;
    let batches = read_table(&table_uri).await?;
    assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 1);
    assert_eq!(
        pretty(&batches)?,
        "+------+-------+\n\
         | name | score |\n\
         +------+-------+\n\
         | ann  | 9.5   |\n\
         +------+-------+"
    );
    Ok(())
}

#[tokio::test]
async fn test_blob_keeps_literal_filename() -> Result<()> {
    let scratch = tempdir()?;
    let memory = Arc::new(InMemory::new());
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::new(memory.clone(), "memory://"),
        Arc::new(RecordingWarehouse::default()),
        CsvOptions::default(),
    );

    let names = ["sales~2024.csv", "report#2.csv", "100%.csv", "data[1].csv"];
    for name in names {
        let receipt = bridge
            .ingest(name, Bytes::from_static(THREE_ROWS.as_bytes()))
            .await?;
        assert_eq!(receipt.blob_key, name);

        let stored = memory
            .get(&object_store::path::Path::parse(name)?)
            .await?
            .bytes()
            .await?;
        assert_eq!(stored, Bytes::from_static(THREE_ROWS.as_bytes()));
    }

    let mut listed: Vec<String> = memory
        .list_with_delimiter(None)
        .await?
        .objects
        .into_iter()
        .map(|meta| meta.location.to_string())
        .collect();
    listed.sort();
    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(listed, expected);
    Ok(())
}

#[tokio::test]
async fn test_local_blob_dir_keeps_literal_filename() -> Result<()> {
    let scratch = tempdir()?;
    let blob_dir = tempdir()?;
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::from_url(&blob_dir.path().to_string_lossy())?,
        Arc::new(RecordingWarehouse::default()),
        CsvOptions::default(),
    );

    for name in ["sales~2024.csv", "100%.csv"] {
        bridge
            .ingest(name, Bytes::from_static(THREE_ROWS.as_bytes()))
            .await?;
        assert_eq!(std::fs::read(blob_dir.path().join(name))?, THREE_ROWS.as_bytes());
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_filename_touches_nothing() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse_dir = tempdir()?;
    let table_dir = warehouse_dir.path().join("uploads");
    let memory = Arc::new(InMemory::new());
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::new(memory.clone(), "memory://"),
        Arc::new(DeltaWarehouse::new(DeltaConfig::new(
            table_dir.to_string_lossy().to_string(),
        ))),
        CsvOptions::default(),
    );

    for name in ["../escape.csv", "bad\u{7}.csv", ""] {
        let err = bridge
            .ingest(name, Bytes::from_static(THREE_ROWS.as_bytes()))
            .await
            .expect_err("invalid name must fail");
        assert!(matches!(err, IngestError::InvalidFilename { .. }), "{err}");
        assert!(err.is_client_error());
        assert_eq!(err.stored_key(), None);
    }

    assert!(memory.list_with_delimiter(None).await?.objects.is_empty());
    assert!(!table_dir.exists());
    assert_eq!(entries(scratch.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_empty_upload_rejected() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse = Arc::new(RecordingWarehouse::default());
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::from_url("memory://")?,
        warehouse.clone(),
        CsvOptions::default(),
    );

    let err = bridge.ingest("data.csv", Bytes::new()).await.expect_err("empty");
    assert!(matches!(err, IngestError::EmptyUpload));
    assert_eq!(warehouse.loads.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_load_failure_reports_stored_blob_and_cleans_scratch() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse = Arc::new(RecordingWarehouse {
        fail: true,
        ..Default::default()
    });
    let blobs = BlobStore::from_url("memory://")?;
    let bridge = IngestBridge::new(
        scratch.path(),
        blobs.clone(),
        warehouse.clone(),
        CsvOptions::default(),
    );

    let err = bridge
        .ingest("data.csv", Bytes::from_static(THREE_ROWS.as_bytes()))
        .await
        .expect_err("load must fail");
    assert!(matches!(err, IngestError::Load { .. }), "{err}");
    assert!(!err.is_client_error());
    assert_eq!(err.stored_key(), Some("data.csv"));
    assert!(err.to_string().contains("Stored data.csv but loading Recorder failed"));

    // Stored but not loaded
    assert_eq!(
        blobs.get(&BlobKey::parse("data.csv")?).await?,
        Bytes::from_static(THREE_ROWS.as_bytes())
    );
    assert_eq!(warehouse.loads.load(Ordering::SeqCst), 1);
    assert_eq!(entries(scratch.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_parse_failure_skips_load() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse = Arc::new(RecordingWarehouse::default());
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::from_url("memory://")?,
        warehouse.clone(),
        CsvOptions::default(),
    );

    let err = bridge
        .ingest("ragged.csv", Bytes::from_static(b"a,b\n1,2,3\n"))
        .await
        .expect_err("ragged rows must fail");
    assert!(matches!(err, IngestError::Parse { .. }), "{err}");
    assert!(err.is_client_error());
    assert_eq!(err.stored_key(), Some("ragged.csv"));
    assert_eq!(warehouse.loads.load(Ordering::SeqCst), 0);
    assert_eq!(entries(scratch.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_headerless_file_is_stored_but_not_loaded() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse = Arc::new(RecordingWarehouse::default());
    let blobs = BlobStore::from_url("memory://")?;
    let bridge = IngestBridge::new(
        scratch.path(),
        blobs.clone(),
        warehouse.clone(),
        CsvOptions::default(),
    );

    let err = bridge
        .ingest("blank.csv", Bytes::from_static(b"\n\n"))
        .await
        .expect_err("no columns");
    assert!(matches!(err, IngestError::Parse { .. }), "{err}");
    assert!(err.is_client_error());
    assert_eq!(err.stored_key(), Some("blank.csv"));
    assert_eq!(
        blobs.get(&BlobKey::parse("blank.csv")?).await?,
        Bytes::from_static(b"\n\n")
    );
    assert_eq!(warehouse.loads.load(Ordering::SeqCst), 0);
    assert_eq!(entries(scratch.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_store_failure_skips_load() -> Result<()> {
    let scratch = tempdir()?;
    let blob_dir = tempdir()?;
    // A non-empty directory where the blob should go makes the write fail
    std::fs::create_dir_all(blob_dir.path().join("data.csv").join("inner"))?;
    let store = LocalFileSystem::new_with_prefix(blob_dir.path())?;

    let warehouse = Arc::new(RecordingWarehouse::default());
    let bridge = IngestBridge::new(
        scratch.path(),
        BlobStore::new(Arc::new(store), "file:///blobs"),
        warehouse.clone(),
        CsvOptions::default(),
    );

    let err = bridge
        .ingest("data.csv", Bytes::from_static(THREE_ROWS.as_bytes()))
        .await
        .expect_err("store must fail");
    assert!(matches!(err, IngestError::Store { .. }), "{err}");
    assert_eq!(err.stored_key(), None);
    assert_eq!(warehouse.loads.load(Ordering::SeqCst), 0);
    assert_eq!(entries(scratch.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_uploads_of_same_name() -> Result<()> {
    let scratch = tempdir()?;
    let warehouse = Arc::new(RecordingWarehouse::default());
    let bridge = Arc::new(IngestBridge::new(
        scratch.path(),
        BlobStore::from_url("memory://")?,
        warehouse.clone(),
        CsvOptions::default(),
    ));

    let uploads = (0..8).map(|i| {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            let body = format!("a,b\n{i},{i}\n");
            bridge.ingest("same.csv", Bytes::from(body)).await
        })
    });

    for upload in uploads.collect::<Vec<_>>() {
        let receipt = upload.await??;
        assert_eq!(receipt.rows, 1);
    }
    assert_eq!(warehouse.loads.load(Ordering::SeqCst), 8);
    assert_eq!(entries(scratch.path()), 0);
    Ok(())
}
