//! Unified error types for pagecache.
//!
//! Display strings carry a stable code prefix so the CLI and log lines can be
//! grepped without parsing.

use std::path::PathBuf;

/// Unified error type for the cache, its configuration, and the fetch client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache cannot be constructed with the given settings.
    #[error("CONFIG_ERROR: {0}")]
    Config(String),

    /// The cache root directory could not be created.
    #[error("CACHE_DIR: cannot create {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem operation on a cache record failed.
    #[error("CACHE_IO: {0}")]
    Io(#[from] std::io::Error),

    /// A cache record could not be decompressed or decoded.
    #[error("CACHE_CORRUPT: {0}")]
    Corrupt(String),

    /// The worker pool dropped a submitted job.
    #[error("WORKER_POOL: {0}")]
    WorkerPool(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl Error {
    /// Whether the error means the record simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Corrupt("abc123.gz".to_string());
        assert!(err.to_string().contains("CACHE_CORRUPT"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_cache_dir_display() {
        let err = Error::CacheDir {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("CACHE_DIR"));
        assert!(msg.contains("/nope"));
    }

    #[test]
    fn test_is_not_found() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
        assert!(!Error::Corrupt("x".into()).is_not_found());
    }
}
