//! Two-tier cache orchestration.
//!
//! Lookups go memory → disk (promoting disk hits) → miss. Writes land in memory
//! immediately and on disk in the background. Callers never see storage
//! errors from `get`, `set` or `clear_expired`: a broken disk behaves like an
//! empty one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, Semaphore};

use super::codec::Codec;
use super::disk::DiskTier;
use super::hash::{CacheKey, compute_cache_key};
use super::memory::{MemoryTier, is_stale};
use crate::Error;
use crate::config::CacheConfig;
use crate::executor::{self, ExecutionStrategy, StrategyKind, WorkerPool};

/// Snapshot of cache state and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_files: usize,
    pub compression_enabled: bool,
    pub max_age_secs: f64,
    /// Whether this build can do native async file I/O at all.
    pub native_async_available: bool,
    /// The strategy this manager actually uses.
    pub strategy: StrategyKind,
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
}

const WRITE_STRIPES: usize = 16;

#[derive(Debug)]
struct Inner {
    memory: MemoryTier,
    disk: DiskTier,
    max_age: Duration,
    sweep_permits: Semaphore,
    runtime: Handle,
    counters: Counters,
    write_seq: AtomicU64,
    /// Latest claimed write per key. An entry is removed once that write lands.
    pending_writes: Mutex<HashMap<CacheKey, u64>>,
    /// Disk writes for one key are serialized on its stripe.
    write_locks: Vec<Mutex<()>>,
}

impl Inner {
    fn write_lock(&self, key: &CacheKey) -> &Mutex<()> {
        &self.write_locks[usize::from(key.as_bytes()[0]) % self.write_locks.len()]
    }

    /// Reserve the next disk write for `key`; any earlier unfinished write for
    /// it is superseded.
    async fn claim_write(&self, key: CacheKey) -> u64 {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending_writes.lock().await.insert(key, seq);
        seq
    }

    /// Write `content` for `key` unless a later write was claimed after `seq`.
    /// Returns whether the file was written.
    async fn persist(&self, key: CacheKey, seq: u64, content: &str) -> Result<bool, Error> {
        let _stripe = self.write_lock(&key).lock().await;

        if self.pending_writes.lock().await.get(&key) != Some(&seq) {
            tracing::debug!(%key, seq, "skipping superseded cache write");
            return Ok(false);
        }

        let result = self.disk.write(&self.disk.path_for(&key), content).await;

        let mut pending = self.pending_writes.lock().await;
        if pending.get(&key) == Some(&seq) {
            pending.remove(&key);
        }
        result.map(|()| true)
    }
}

/// Tiered page cache.
///
/// Cheap to clone; clones share both tiers.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    /// Build a manager whose execution strategy follows `config.execution`.
    ///
    /// Must be called from within a Tokio runtime; background writes are
    /// spawned on it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` outside a runtime or for an unusable strategy,
    /// and `Error::CacheDir` if the root directory cannot be created.
    pub fn new(config: CacheConfig) -> Result<Self, Error> {
        let pool = WorkerPool::current(config.worker_threads)?;
        let strategy = executor::select(config.execution, pool)?;
        Self::with_strategy(config, strategy)
    }

    /// Build a manager on an explicitly chosen strategy.
    ///
    /// `config.execution` and `config.worker_threads` are ignored.
    pub fn with_strategy(config: CacheConfig, strategy: Arc<dyn ExecutionStrategy>) -> Result<Self, Error> {
        if config.sweep_concurrency == 0 {
            return Err(Error::Config("sweep_concurrency must be greater than 0".into()));
        }

        let runtime =
            Handle::try_current().map_err(|e| Error::Config(format!("cache manager needs a Tokio runtime: {e}")))?;

        let disk = DiskTier::open(&config.root, Codec::from_compression(config.compression), strategy)?;

        tracing::debug!(
            root = %config.root.display(),
            max_age_secs = config.max_age.as_secs_f64(),
            compression = config.compression,
            strategy = %disk.strategy().kind(),
            "cache manager ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                memory: MemoryTier::new(),
                disk,
                max_age: config.max_age,
                sweep_permits: Semaphore::new(config.sweep_concurrency),
                runtime,
                counters: Counters::default(),
                write_seq: AtomicU64::new(0),
                pending_writes: Mutex::new(HashMap::new()),
                write_locks: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        self.inner.disk.root()
    }

    pub fn max_age(&self) -> Duration {
        self.inner.max_age
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.inner.disk.strategy().kind()
    }

    /// Look up `identifier`, returning the cached body if either tier holds a
    /// fresh copy.
    pub async fn get(&self, identifier: &str) -> Option<String> {
        let inner = &self.inner;
        let key = compute_cache_key(identifier);
        let now = SystemTime::now();

        if let Some(entry) = inner.memory.lookup(&key).await {
            if !entry.is_expired(now, inner.max_age) {
                inner.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%key, "memory cache hit");
                return Some(entry.content);
            }
            // Stale in memory; disk may still hold a fresher write.
            inner.memory.evict_stale(&key, now, inner.max_age).await;
        }

        let path = inner.disk.path_for(&key);
        let modified = match inner.disk.stat_mod_time(&path).await {
            Ok(Some(modified)) => modified,
            Ok(None) => return self.miss(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot stat cache file");
                return self.miss();
            }
        };

        if is_stale(modified, now, inner.max_age) {
            tracing::debug!(%key, "disk cache entry expired");
            inner.disk.remove(&path).await;
            return self.miss();
        }

        match inner.disk.read(&path).await {
            Ok(Some(content)) => {
                inner.memory.insert(key, content.clone(), SystemTime::now()).await;
                inner.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%key, "disk cache hit");
                Some(content)
            }
            Ok(None) => self.miss(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                inner.disk.remove(&path).await;
                self.miss()
            }
        }
    }

    fn miss(&self) -> Option<String> {
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cache `content` under `identifier`.
    ///
    /// The memory tier is updated before this returns. The disk write is
    /// spawned and not awaited: it is attempted at most once and a failure is
    /// only logged. Writes for the same identifier land in call order; one
    /// overtaken by a later `set` is dropped.
    pub async fn set(&self, identifier: &str, content: impl Into<String>) {
        let content = content.into();
        let key = compute_cache_key(identifier);

        self.inner.memory.insert(key, content.clone(), SystemTime::now()).await;
        let seq = self.inner.claim_write(key).await;

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            match inner.persist(key, seq, &content).await {
                Ok(true) => tracing::debug!(%key, "cache file written"),
                Ok(false) => {}
                Err(e) => tracing::warn!(%key, error = %e, "failed to write cache file"),
            }
        });
    }

    /// [`set`](Self::set) for several entries. Later entries win when an
    /// identifier repeats.
    pub async fn set_many<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (identifier, content) in entries {
            self.set(identifier.as_ref(), content).await;
        }
    }

    /// Look up several identifiers concurrently. Every requested identifier
    /// is present in the result, mapped to `None` on a miss.
    pub async fn get_many(&self, identifiers: &[&str]) -> HashMap<String, Option<String>> {
        join_all(
            identifiers
                .iter()
                .map(|&identifier| async move { (identifier.to_string(), self.get(identifier).await) }),
        )
        .await
        .into_iter()
        .collect()
    }

    /// Like [`set`](Self::set), but waits for the disk write and reports its
    /// failure. The memory entry stays in place either way.
    pub async fn set_persisted(&self, identifier: &str, content: impl Into<String>) -> Result<(), Error> {
        let content = content.into();
        let key = compute_cache_key(identifier);

        self.inner.memory.insert(key, content.clone(), SystemTime::now()).await;
        let seq = self.inner.claim_write(key).await;

        // A superseded write is not an error: the later one owns the record.
        self.inner.persist(key, seq, &content).await.map(|_| ())
    }

    /// Remove everything older than `max_age` (the configured TTL by default)
    /// from both tiers. Returns the number of memory entries plus disk files
    /// removed.
    pub async fn clear_expired(&self, max_age: Option<Duration>) -> usize {
        let max_age = max_age.unwrap_or(self.inner.max_age);
        let now = SystemTime::now();

        let memory_cleared = self.inner.memory.sweep_expired(now, max_age).await;
        let disk_cleared = self
            .sweep_disk(|modified| is_stale(modified, now, max_age))
            .await;

        let total = memory_cleared + disk_cleared;
        if total > 0 {
            tracing::info!(memory_cleared, disk_cleared, "cleared expired cache entries");
        }
        total
    }

    /// Drop `identifier` from both tiers. Returns whether either held it.
    pub async fn invalidate(&self, identifier: &str) -> bool {
        let key = compute_cache_key(identifier);
        let in_memory = self.inner.memory.evict(&key).await;

        // Cancel queued writes so they cannot bring the record back.
        let _stripe = self.inner.write_lock(&key).lock().await;
        self.inner.pending_writes.lock().await.remove(&key);
        let on_disk = self.inner.disk.remove(&self.inner.disk.path_for(&key)).await;
        in_memory || on_disk
    }

    /// Empty both tiers. Returns the number of entries and files removed.
    pub async fn clear(&self) -> usize {
        let memory_cleared = self.inner.memory.clear().await;
        self.inner.pending_writes.lock().await.clear();
        let disk_cleared = self.sweep_disk(|_| true).await;
        tracing::info!(memory_cleared, disk_cleared, "cache cleared");
        memory_cleared + disk_cleared
    }

    /// Stat every file under the root and remove those `should_remove`
    /// accepts, holding a sweep permit for each file's operations.
    async fn sweep_disk<P>(&self, should_remove: P) -> usize
    where
        P: Fn(SystemTime) -> bool,
    {
        let disk = &self.inner.disk;
        let files = match disk.list().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(root = %disk.root().display(), error = %e, "cannot list cache directory");
                return 0;
            }
        };

        let permits = &self.inner.sweep_permits;
        let should_remove = &should_remove;
        let removed = join_all(files.iter().map(|path| async move {
            let Ok(_permit) = permits.acquire().await else {
                return false;
            };
            match disk.stat_mod_time(path).await {
                Ok(Some(modified)) if should_remove(modified) => disk.remove(path).await,
                Ok(_) => false,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "error checking cache file");
                    false
                }
            }
        }))
        .await;

        removed.into_iter().filter(|removed| *removed).count()
    }

    /// Current sizes, settings, and hit/miss counters.
    pub async fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        let disk_files = inner.disk.record_count().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "cannot count cache files");
            0
        });

        let memory_hits = inner.counters.memory_hits.load(Ordering::Relaxed);
        let disk_hits = inner.counters.disk_hits.load(Ordering::Relaxed);
        let misses = inner.counters.misses.load(Ordering::Relaxed);
        let lookups = memory_hits + disk_hits + misses;
        let hit_rate = if lookups > 0 { (memory_hits + disk_hits) as f64 / lookups as f64 } else { 0.0 };

        CacheStats {
            memory_entries: inner.memory.len().await,
            disk_files,
            compression_enabled: inner.disk.codec().is_compressed(),
            max_age_secs: inner.max_age.as_secs_f64(),
            native_async_available: executor::NATIVE_FS_AVAILABLE,
            strategy: self.strategy_kind(),
            memory_hits,
            disk_hits,
            misses,
            hit_rate,
        }
    }
}
