//! Native async file I/O via `tokio::fs`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;

use super::{ExecutionStrategy, StrategyKind, temp_path};
use crate::Error;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeIo;

impl NativeIo {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionStrategy for NativeIo {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Native
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, Error> {
        Ok(fs::read(path).await?)
    }

    async fn write(&self, path: &Path, bytes: Vec<u8>) -> Result<(), Error> {
        let tmp = temp_path(path);

        if let Err(e) = fs::write(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<(), Error> {
        Ok(fs::remove_file(path).await?)
    }

    async fn modified(&self, path: &Path) -> Result<SystemTime, Error> {
        Ok(fs::metadata(path).await?.modified()?)
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut entries = fs::read_dir(dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        Ok(files)
    }
}
