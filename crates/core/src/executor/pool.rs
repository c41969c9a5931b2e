//! Bounded worker pool and the blocking-I/O strategy built on it.
//!
//! Jobs run on the runtime's blocking threads; a semaphore caps how many of
//! this pool's jobs run at once so a large sweep cannot flood the host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use super::{ExecutionStrategy, StrategyKind, temp_path};
use crate::Error;

/// Shared pool for blocking work.
///
/// Cloning shares the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    runtime: Handle,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// A pool of `size` concurrent jobs on `runtime`.
    pub fn new(runtime: Handle, size: usize) -> Self {
        let size = size.max(1);
        Self { runtime, permits: Arc::new(Semaphore::new(size)), size }
    }

    /// A pool on the runtime the caller is running in.
    pub fn current(size: usize) -> Result<Self, Error> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("worker pool needs a Tokio runtime: {e}")))?;
        Ok(Self::new(runtime, size))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` on a worker and resolve with its result.
    ///
    /// Waits for a free permit first. If the caller drops the returned future
    /// after the job started, the job still runs to completion.
    pub async fn submit<F, T>(&self, job: F) -> Result<T, Error>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        self.runtime
            .spawn_blocking(job)
            .await
            .map_err(|e| Error::WorkerPool(e.to_string()))
    }
}

/// Blocking `std::fs` I/O dispatched through a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct ThreadPoolIo {
    pool: WorkerPool,
}

impl ThreadPoolIo {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);

    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

#[async_trait]
impl ExecutionStrategy for ThreadPoolIo {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ThreadPool
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, Error> {
        let path = path.to_path_buf();
        Ok(self.pool.submit(move || fs::read(path)).await??)
    }

    async fn write(&self, path: &Path, bytes: Vec<u8>) -> Result<(), Error> {
        let path = path.to_path_buf();
        Ok(self.pool.submit(move || write_atomic(&path, &bytes)).await??)
    }

    async fn remove(&self, path: &Path) -> Result<(), Error> {
        let path = path.to_path_buf();
        Ok(self.pool.submit(move || fs::remove_file(path)).await??)
    }

    async fn modified(&self, path: &Path) -> Result<SystemTime, Error> {
        let path = path.to_path_buf();
        Ok(self.pool.submit(move || fs::metadata(path)?.modified()).await??)
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let dir = dir.to_path_buf();
        Ok(self.pool.submit(move || list_files(&dir)).await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_returns_result() {
        let pool = WorkerPool::current(2).unwrap();
        let value = pool.submit(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.size(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_submit_is_bounded() {
        let pool = WorkerPool::current(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..12).map(|_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
            })
        });

        for result in futures_util::future::join_all(jobs).await {
            result.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_zero_size_pool_is_clamped() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let pool = WorkerPool::new(rt.handle().clone(), 0);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_thread_pool_io_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let io = ThreadPoolIo::new(WorkerPool::current(2).unwrap());
        let path = dir.path().join("page.txt");

        io.write(&path, b"body".to_vec()).await.unwrap();
        assert_eq!(io.read(&path).await.unwrap(), b"body");
        assert_eq!(io.list(dir.path()).await.unwrap(), vec![path.clone()]);
        assert!(io.modified(&path).await.is_ok());

        io.remove(&path).await.unwrap();
        assert!(io.remove(&path).await.unwrap_err().is_not_found());
    }
}
