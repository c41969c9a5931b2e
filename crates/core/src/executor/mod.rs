//! Execution strategies for cache file I/O.
//!
//! The cache manager is written once against [`ExecutionStrategy`]. Two
//! implementations exist:
//!
//! - [`NativeIo`]: non-blocking `tokio::fs` operations (cargo feature `native-fs`).
//! - [`ThreadPoolIo`]: blocking `std::fs` operations submitted to an injected
//!   [`WorkerPool`] and bridged back as futures.
//!
//! The strategy is picked once per manager by [`select`] and never swapped.

#[cfg(feature = "native-fs")]
mod native;
mod pool;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;

use crate::Error;
use crate::config::ExecutionMode;

#[cfg(feature = "native-fs")]
pub use native::NativeIo;
pub use pool::{ThreadPoolIo, WorkerPool};

/// Whether this build can perform native async file I/O.
pub const NATIVE_FS_AVAILABLE: bool = cfg!(feature = "native-fs");

/// Which strategy is servicing a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Native,
    ThreadPool,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Native => f.write_str("native"),
            StrategyKind::ThreadPool => f.write_str("thread_pool"),
        }
    }
}

/// File operations the cache needs, with one async contract for every backend.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, Error>;

    /// Write `bytes` to `path` through a temporary sibling and a rename, so a
    /// concurrent reader sees either the old file or the complete new one.
    async fn write(&self, path: &Path, bytes: Vec<u8>) -> Result<(), Error>;

    async fn remove(&self, path: &Path) -> Result<(), Error>;

    async fn modified(&self, path: &Path) -> Result<SystemTime, Error>;

    /// Regular files directly under `dir`.
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, Error>;
}

/// Pick the strategy for `mode`.
///
/// `Auto` resolves to native I/O when compiled in and to the worker pool
/// otherwise. Asking for `Native` in a build without it is a configuration
/// error.
pub fn select(mode: ExecutionMode, pool: WorkerPool) -> Result<Arc<dyn ExecutionStrategy>, Error> {
    let native = match mode {
        ExecutionMode::Auto => NATIVE_FS_AVAILABLE,
        ExecutionMode::Native if !NATIVE_FS_AVAILABLE => {
            return Err(Error::Config(
                "native execution requested but this build lacks the native-fs feature".into(),
            ));
        }
        ExecutionMode::Native => true,
        ExecutionMode::ThreadPool => false,
    };

    if !native {
        if mode == ExecutionMode::Auto {
            tracing::warn!("native async file I/O unavailable; falling back to worker pool");
        }
        return Ok(Arc::new(ThreadPoolIo::new(pool)));
    }

    native_strategy()
}

#[cfg(feature = "native-fs")]
fn native_strategy() -> Result<Arc<dyn ExecutionStrategy>, Error> {
    Ok(Arc::new(NativeIo::new()))
}

#[cfg(not(feature = "native-fs"))]
fn native_strategy() -> Result<Arc<dyn ExecutionStrategy>, Error> {
    Err(Error::Config("native-fs feature disabled".into()))
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling used while a record is being written.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}
