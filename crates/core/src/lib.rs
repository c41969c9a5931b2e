//! Core types and shared functionality for pagecache.
//!
//! This crate provides:
//! - Tiered (memory + disk) page cache with TTL expiry
//! - Native async and worker-pool execution strategies for file I/O
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;

pub use cache::{CacheKey, CacheManager, CacheStats};
pub use config::{AppConfig, CacheConfig, ExecutionMode};
pub use error::Error;
pub use executor::{ExecutionStrategy, StrategyKind, WorkerPool};
