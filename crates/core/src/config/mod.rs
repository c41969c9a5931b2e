//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGECACHE_*)
//! 2. TOML config file (if PAGECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// How the cache performs file I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Native async file I/O when compiled in, thread pool otherwise.
    #[default]
    Auto,
    /// Always use native async file I/O.
    Native,
    /// Always dispatch blocking file I/O to the worker pool.
    ThreadPool,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAGECACHE_*)
/// 2. TOML config file (if PAGECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one file per cached page.
    ///
    /// Set via PAGECACHE_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Seconds after which an entry is stale in either tier.
    ///
    /// Set via PAGECACHE_MAX_AGE_SECS environment variable.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Whether disk records are gzip-compressed.
    ///
    /// Set via PAGECACHE_COMPRESSION environment variable.
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Maximum simultaneous file operations during a sweep.
    ///
    /// Set via PAGECACHE_SWEEP_CONCURRENCY environment variable.
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,

    /// Execution strategy for file I/O.
    ///
    /// Set via PAGECACHE_EXECUTION environment variable (auto, native, thread_pool).
    #[serde(default)]
    pub execution: ExecutionMode,

    /// Maximum blocking jobs the worker pool runs at once.
    ///
    /// Set via PAGECACHE_WORKER_THREADS environment variable.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PAGECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PAGECACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via PAGECACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.request_cache")
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_sweep_concurrency() -> usize {
    10
}

fn default_worker_threads() -> usize {
    4
}

fn default_user_agent() -> String {
    "pagecache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_age_secs: default_max_age_secs(),
            compression: true,
            sweep_concurrency: default_sweep_concurrency(),
            execution: ExecutionMode::Auto,
            worker_threads: default_worker_threads(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Settings consumed by [`crate::CacheManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub max_age: Duration,
    pub compression: bool,
    pub sweep_concurrency: usize,
    pub execution: ExecutionMode,
    pub worker_threads: usize,
}

impl CacheConfig {
    /// Defaults rooted at `root`: one hour TTL, compression on, 10 sweep permits.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_age: Duration::from_secs(default_max_age_secs()),
            compression: true,
            sweep_concurrency: default_sweep_concurrency(),
            execution: ExecutionMode::Auto,
            worker_threads: default_worker_threads(),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_sweep_concurrency(mut self, permits: usize) -> Self {
        self.sweep_concurrency = permits;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL as Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// The manager-facing subset of this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            root: self.cache_dir.clone(),
            max_age: self.max_age(),
            compression: self.compression,
            sweep_concurrency: self.sweep_concurrency,
            execution: self.execution,
            worker_threads: self.worker_threads,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGECACHE_`
    /// 2. TOML file from `PAGECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAGECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from("./.request_cache"));
        assert_eq!(config.max_age_secs, 3600);
        assert!(config.compression);
        assert_eq!(config.sweep_concurrency, 10);
        assert_eq!(config.execution, ExecutionMode::Auto);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.user_agent, "pagecache/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_bytes, 5_242_880);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.max_age(), Duration::from_secs(3600));
    }

    #[test]
    fn test_cache_config_from_app_config() {
        let config = AppConfig {
            cache_dir: PathBuf::from("/tmp/pages"),
            compression: false,
            execution: ExecutionMode::ThreadPool,
            ..Default::default()
        };
        let cache = config.cache_config();
        assert_eq!(cache.root, PathBuf::from("/tmp/pages"));
        assert!(!cache.compression);
        assert_eq!(cache.execution, ExecutionMode::ThreadPool);
        assert_eq!(cache.max_age, Duration::from_secs(3600));
    }

    #[test]
    fn test_cache_config_builder() {
        let cache = CacheConfig::new("/tmp/pages")
            .with_max_age(Duration::from_secs(5))
            .with_compression(false)
            .with_sweep_concurrency(3);
        assert_eq!(cache.max_age, Duration::from_secs(5));
        assert!(!cache.compression);
        assert_eq!(cache.sweep_concurrency, 3);
        assert_eq!(cache.worker_threads, 4);
    }

    #[test]
    fn test_execution_mode_from_toml() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string("execution = \"thread_pool\"\nmax_age_secs = 60"))
            .extract()
            .unwrap();
        assert_eq!(config.execution, ExecutionMode::ThreadPool);
        assert_eq!(config.max_age_secs, 60);
    }
}
