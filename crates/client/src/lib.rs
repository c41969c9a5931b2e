//! Client code for pagecache.
//!
//! This crate provides the HTTP fetch step and the fetch-through wrapper that
//! consults the page cache before going to the network.

pub mod cached;
pub mod fetch;

pub use cached::{CachedFetcher, Page};
pub use fetch::{FetchConfig, FetchResponse, Fetcher, HttpFetcher, cache_identifier, canonicalize};
