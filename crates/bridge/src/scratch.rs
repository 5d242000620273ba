//! Local scratch copies of uploads

use bytes::Bytes;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// An upload written to an opaquely named file in the scratch directory
///
/// The file is deleted when this value is dropped, so every exit from an
/// ingest cleans up after itself.
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    pub fn create(dir: &Path, data: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".csv")
            .tempfile_in(dir)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(Self { file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> std::io::Result<Bytes> {
        tokio::fs::read(self.path()).await.map(Bytes::from)
    }

    /// Delete now and report any error, rather than on drop
    pub fn remove(self) -> std::io::Result<()> {
        self.file.close()
    }
}
