//! Object store holding the raw uploads

use crate::{BlobKey, IngestError};
use bytes::Bytes;
use diagnostics::debug;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload, PutResult};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

#[derive(Clone, Debug, Deserialize)]
pub struct BlobStoreConfig {
    /// `gs://bucket[/prefix]`, `s3://bucket[/prefix]`, `memory://`,
    /// `file:///dir` or a plain directory path
    pub url: String,
}

/// Where uploaded files are kept, keyed by filename
#[derive(Clone)]
pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
    url: String,
}

impl BlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, url: impl Into<String>) -> Self {
        Self {
            store,
            prefix: Path::default(),
            url: url.into(),
        }
    }

    /// Place every blob under `prefix`, taken verbatim
    pub fn with_prefix(mut self, prefix: &str) -> Result<Self, IngestError> {
        self.prefix = Path::parse(prefix).map_err(|e| {
            IngestError::Configuration(format!("invalid blob prefix {prefix}: {e}"))
        })?;
        Ok(self)
    }

    pub fn from_config(config: &BlobStoreConfig) -> Result<Self, IngestError> {
        Self::from_url(&config.url)
    }

    pub fn from_url(url: &str) -> Result<Self, IngestError> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => return Self::local(url, url),
            Err(e) => {
                return Err(IngestError::Configuration(format!(
                    "invalid blob store URL {url}: {e}"
                )));
            }
        };

        let bucket = parsed.host_str().unwrap_or_default();
        let prefix = Path::from_url_path(parsed.path()).map_err(|e| {
            IngestError::Configuration(format!("invalid blob prefix in {url}: {e}"))
        })?;

        let store: Arc<dyn ObjectStore> = match parsed.scheme() {
            "gs" => Arc::new(
                object_store::gcp::GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(require_bucket(url, bucket)?)
                    .build()
                    .map_err(|e| {
                        IngestError::Configuration(format!("Failed to build GCS store: {e}"))
                    })?,
            ),
            "s3" => Arc::new(
                object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(require_bucket(url, bucket)?)
                    .build()
                    .map_err(|e| {
                        IngestError::Configuration(format!("Failed to build S3 store: {e}"))
                    })?,
            ),
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            "file" => {
                let path = parsed.to_file_path().map_err(|()| {
                    IngestError::Configuration(format!("invalid file URL {url}"))
                })?;
                return Self::local(&path.to_string_lossy(), url);
            }
            other => {
                return Err(IngestError::Configuration(format!(
                    "unsupported blob store scheme '{other}' in {url}"
                )));
            }
        };

        let mut blobs = Self::new(store, url);
        blobs.prefix = prefix;
        Ok(blobs)
    }

    fn local(dir: &str, url: &str) -> Result<Self, IngestError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            IngestError::Configuration(format!("Failed to create blob directory {dir}: {e}"))
        })?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(dir).map_err(|e| {
            IngestError::Configuration(format!("Failed to build local store: {e}"))
        })?;
        Ok(Self::new(Arc::new(store), url))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The object path for `key`, with the filename kept verbatim
    ///
    /// `Path::child` would percent-encode characters such as `~` or `%`.
    pub fn location(&self, key: &BlobKey) -> object_store::Result<Path> {
        let leaf = Path::parse(key.as_str())?;
        Ok(self.prefix.parts().chain(leaf.parts()).collect())
    }

    /// Write the blob, replacing any existing blob with the same key
    pub async fn put(&self, key: &BlobKey, data: Bytes) -> object_store::Result<PutResult> {
        let location = self.location(key)?;
        let size = data.len();
        let result = self.store.put(&location, PutPayload::from(data)).await?;
        let location = location.to_string();
        debug!("Wrote {size} bytes to {location}", size, location);
        Ok(result)
    }

    pub async fn get(&self, key: &BlobKey) -> object_store::Result<Bytes> {
        self.store.get(&self.location(key)?).await?.bytes().await
    }
}

fn require_bucket<'a>(url: &str, bucket: &'a str) -> Result<&'a str, IngestError> {
    if bucket.is_empty() {
        Err(IngestError::Configuration(format!(
            "blob store URL {url} has no bucket"
        )))
    } else {
        Ok(bucket)
    }
}
