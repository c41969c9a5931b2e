//! URL canonicalization so equivalent spellings share one cache entry.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string before it is fetched or used as a cache identifier.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host (the parser also drops default ports)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let mut parsed = url::Url::parse(&with_scheme).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// The cache identifier for a URL: its canonical serialization.
pub fn cache_identifier(input: &str) -> Result<String, UrlError> {
    canonicalize(input).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com/docs").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs");
    }

    #[test]
    fn test_canonicalize_lowercase_host_keeps_path_case() {
        let url = canonicalize("https://EXAMPLE.com/Docs/Intro").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Docs/Intro");
    }

    #[test]
    fn test_canonicalize_strips_fragment_keeps_query() {
        let url = canonicalize("https://example.com/a?b=2&a=1#section").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a?b=2&a=1");
    }

    #[test]
    fn test_canonicalize_drops_default_port() {
        let url = canonicalize("https://example.com:443/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_rejects_other_schemes() {
        assert!(matches!(canonicalize("ftp://example.com/file"), Err(UrlError::UnsupportedScheme(s)) if s == "ftp"));
    }

    #[test]
    fn test_canonicalize_rejects_blank() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("  \t "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_equivalent_spellings_share_identifier() {
        let a = cache_identifier("  Example.COM/page#top ").unwrap();
        let b = cache_identifier("https://example.com/page").unwrap();
        assert_eq!(a, b);
    }
}
