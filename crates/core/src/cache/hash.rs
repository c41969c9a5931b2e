//! Cache key derivation and record paths.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::codec::Codec;

/// 128-bit key derived from a source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 16]);

impl CacheKey {
    /// Lowercase hex form, used as the record file stem.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the cache key for an identifier (usually a canonical URL).
///
/// The key is the leading 16 bytes of the SHA-256 digest of the identifier's
/// UTF-8 bytes. Every string, including the empty one, has a key.
pub fn compute_cache_key(identifier: &str) -> CacheKey {
    let digest = Sha256::digest(identifier.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    CacheKey(key)
}

/// File name of the record for `key` under the given codec.
pub fn record_file_name(key: &CacheKey, codec: Codec) -> String {
    format!("{}{}", key.to_hex(), codec.suffix())
}

/// Path of the record for `identifier` under `root`.
pub fn record_path(root: &Path, identifier: &str, codec: Codec) -> PathBuf {
    root.join(record_file_name(&compute_cache_key(identifier), codec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let key1 = compute_cache_key("https://example.com/");
        let key2 = compute_cache_key("https://example.com/");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_hash_different_identifiers() {
        let a = compute_cache_key("https://example.com/a");
        let b = compute_cache_key("https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let key = compute_cache_key("https://example.com/");
        let hex = key.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key.to_string(), hex);
    }

    #[test]
    fn test_empty_identifier_has_key() {
        // SHA-256("") begins e3b0c442...
        let key = compute_cache_key("");
        assert!(key.to_hex().starts_with("e3b0c44298fc1c14"));
    }

    #[test]
    fn test_record_path_suffix() {
        let root = Path::new("/var/cache/pages");
        let gz = record_path(root, "https://example.com/", Codec::Gzip);
        let txt = record_path(root, "https://example.com/", Codec::Plain);

        assert_eq!(gz.parent(), Some(root));
        assert!(gz.to_string_lossy().ends_with(".gz"));
        assert!(txt.to_string_lossy().ends_with(".txt"));
        assert_eq!(gz.file_stem(), txt.file_stem());
    }
}
