//! Fetch-through cache: consult the page cache before touching the network.

use pagecache_core::{CacheManager, Error};

use crate::fetch::{Fetcher, canonicalize};

/// A page body and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Canonical URL, also the cache identifier.
    pub url: String,
    pub body: String,
    pub from_cache: bool,
}

/// Wraps a [`Fetcher`] with a [`CacheManager`].
pub struct CachedFetcher<F> {
    fetcher: F,
    cache: CacheManager,
    persist_writes: bool,
}

impl<F: Fetcher> CachedFetcher<F> {
    pub fn new(fetcher: F, cache: CacheManager) -> Self {
        Self { fetcher, cache, persist_writes: false }
    }

    /// Wait for fetched bodies to reach disk before `get` returns, for
    /// processes that exit right after fetching.
    pub fn with_persisted_writes(mut self, persist: bool) -> Self {
        self.persist_writes = persist;
        self
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Return the body for `url`, fetching only on a cache miss or when
    /// `force_refresh` is set. Fetched bodies are written back with
    /// [`CacheManager::set`], or [`CacheManager::set_persisted`] when persisted
    /// writes are on. A failed persisted write is logged; the page is still
    /// returned.
    pub async fn get(&self, url: &str, force_refresh: bool) -> Result<Page, Error> {
        let url = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let identifier = url.to_string();

        if !force_refresh && let Some(body) = self.cache.get(&identifier).await {
            tracing::debug!(url = %identifier, "cache hit");
            return Ok(Page { url: identifier, body, from_cache: true });
        }

        let response = self.fetcher.fetch(&url).await?;
        let body = response.text();
        if self.persist_writes {
            if let Err(e) = self.cache.set_persisted(&identifier, body.clone()).await {
                tracing::warn!(url = %identifier, error = %e, "failed to persist fetched page");
            }
        } else {
            self.cache.set(&identifier, body.clone()).await;
        }

        Ok(Page { url: identifier, body, from_cache: false })
    }
}
