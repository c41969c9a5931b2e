//! Two-tier page cache: in-process memory over one-file-per-entry disk storage.
//!
//! This module provides:
//!
//! - 128-bit keys derived from source identifiers (SHA-256 prefix)
//! - Optional gzip compression of disk records
//! - TTL expiry driven by insertion time (memory) and file mtime (disk)
//! - Bounded-concurrency expiry sweeps

pub mod codec;
pub mod disk;
pub mod hash;
pub mod manager;
pub mod memory;

pub use crate::Error;

pub use codec::Codec;
pub use disk::DiskTier;
pub use hash::{CacheKey, compute_cache_key, record_path};
pub use manager::{CacheManager, CacheStats};
pub use memory::{MemoryEntry, MemoryTier};
