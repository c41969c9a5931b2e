//! Durable tier: one file per entry under a root directory.
//!
//! The file's modification time is the only staleness signal. Removal is
//! best-effort everywhere in this module; failures are logged, never raised.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::codec::Codec;
use super::hash::{CacheKey, record_file_name};
use crate::Error;
use crate::executor::ExecutionStrategy;

/// Disk storage for cache records.
#[derive(Debug, Clone)]
pub struct DiskTier {
    root: PathBuf,
    codec: Codec,
    io: Arc<dyn ExecutionStrategy>,
}

impl DiskTier {
    /// Open the tier at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDir` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>, codec: Codec, io: Arc<dyn ExecutionStrategy>) -> Result<Self, Error> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| Error::CacheDir { path: root.clone(), source })?;
        Ok(Self { root, codec, io })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn strategy(&self) -> &Arc<dyn ExecutionStrategy> {
        &self.io
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(record_file_name(key, self.codec))
    }

    /// Read and decode a record.
    ///
    /// The codec follows the path's suffix. Returns `Ok(None)` when the file
    /// does not exist and `Error::Corrupt` when it cannot be decoded.
    pub async fn read(&self, path: &Path) -> Result<Option<String>, Error> {
        let codec = Codec::from_compression(path.extension().is_some_and(|ext| ext == "gz"));
        match self.io.read(path).await {
            Ok(bytes) => codec.decode(bytes).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode `content` with this tier's codec and write it to `path`.
    pub async fn write(&self, path: &Path, content: &str) -> Result<(), Error> {
        let bytes = self.codec.encode(content)?;
        self.io.write(path, bytes).await
    }

    /// Best-effort delete. Returns whether this call removed the file.
    pub async fn remove(&self, path: &Path) -> bool {
        match self.io.remove(path).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %path.display(), "cache file already removed");
                false
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
                false
            }
        }
    }

    /// Modification time of `path`, or `None` if it does not exist.
    pub async fn stat_mod_time(&self, path: &Path) -> Result<Option<SystemTime>, Error> {
        match self.io.modified(path).await {
            Ok(modified) => Ok(Some(modified)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every regular file under the root, temporaries included.
    pub async fn list(&self) -> Result<Vec<PathBuf>, Error> {
        self.io.list(&self.root).await
    }

    /// Number of committed records (temporaries excluded).
    pub async fn record_count(&self) -> Result<usize, Error> {
        let files = self.list().await?;
        Ok(files.iter().filter(|path| !is_temporary(path)).count())
    }
}

fn is_temporary(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}
