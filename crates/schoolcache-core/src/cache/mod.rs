//! Response cache backed by the durable store.
//!
//! This module provides the `CacheManager`, which stores GET response bodies
//! under `cache_<METHOD>_<path>` keys. Entries are valid for 5 minutes and
//! are evicted lazily: an expired entry is removed by the read that finds it.
//!
//! Writes elsewhere in the application that need to keep cached collections
//! in step (adding a student, deleting one) go through
//! `CacheManager::update` and `CacheManager::invalidate` rather than
//! touching storage keys directly.

pub mod manager;

pub use manager::{
    CacheEntry, CacheEntryInfo, CacheError, CacheManager, CacheStats, CACHE_PREFIX, DEFAULT_TTL_MS,
};
