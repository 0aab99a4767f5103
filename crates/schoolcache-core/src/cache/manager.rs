use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::Method;
use crate::clock::{Clock, SystemClock};
use crate::store::{KvStore, StoreError};

/// Prefix for every storage key written by the cache.
pub const CACHE_PREFIX: &str = "cache_";

/// Entries are valid for 5 minutes after they are written.
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1000;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One stored response body.
///
/// Serialized as `{"data": ..., "timestamp": <epoch-ms>, "expiresIn": <ms>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    #[serde(rename = "timestamp")]
    pub stored_at: i64,
    #[serde(rename = "expiresIn")]
    pub ttl: i64,
}

impl CacheEntry {
    pub fn new(data: Value, stored_at: i64, ttl: i64) -> Self {
        Self {
            data,
            stored_at,
            ttl,
        }
    }

    /// `None` when the stored timestamp is too far from `now` to subtract,
    /// which only happens for corrupt entries
    pub fn age_ms(&self, now: i64) -> Option<i64> {
        now.checked_sub(self.stored_at)
    }

    /// Valid iff `now - stored_at <= ttl`
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.age_ms(now).is_some_and(|age| age <= self.ttl)
    }

    pub fn age_display(&self, now: i64) -> String {
        let seconds = now.saturating_sub(self.stored_at) / 1000;
        if seconds < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if seconds < 60 {
            format!("{}s ago", seconds)
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else if seconds < 86_400 {
            format!("{}h ago", seconds / 3600)
        } else {
            format!("{}d ago", seconds / 86_400)
        }
    }
}

/// Summary of one stored entry, for status display.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub key: String,
    pub age: String,
    pub expired: bool,
    pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub entries: Vec<CacheEntryInfo>,
    pub used_bytes: usize,
}

impl CacheStats {
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.expired).count()
    }

    pub fn expired_count(&self) -> usize {
        self.entries.iter().filter(|e| e.expired).count()
    }
}

/// Sole owner of durable-store access for cached responses.
///
/// All reads and writes happen under one lock, so a read-modify-write
/// through [`CacheManager::update`] cannot interleave with another writer.
pub struct CacheManager {
    store: Mutex<Box<dyn KvStore>>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl CacheManager {
    pub fn new(store: impl KvStore + 'static) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: impl KvStore + 'static, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
            clock,
            ttl_ms: DEFAULT_TTL_MS,
        }
    }

    pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Cache key for a request: method and path only, query excluded.
    pub fn key_for(method: Method, path: &str) -> String {
        format!("{}_{}", method, path)
    }

    /// Storage key the entry for `key` lives under
    pub fn storage_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn KvStore>> {
        // A panic while holding the lock cannot leave the map half-written
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read a valid entry. Missing, corrupt and expired entries all read as
    /// `None`; corrupt and expired ones are removed on the way.
    pub fn load(&self, key: &str) -> Option<CacheEntry> {
        let mut store = self.lock();
        match self.load_locked(store.as_mut(), key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn load_locked(&self, store: &mut dyn KvStore, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let storage_key = Self::storage_key(key);
        let Some(raw) = store.get(&storage_key)? else {
            debug!(key, "Cache miss");
            return Ok(None);
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "Removing corrupt cache entry");
                store.remove(&storage_key)?;
                return Ok(None);
            }
        };

        let now = self.clock.now_ms();
        let Some(age_ms) = entry.age_ms(now) else {
            debug!(key, stored_at = entry.stored_at, "Removing cache entry with bad timestamp");
            store.remove(&storage_key)?;
            return Ok(None);
        };
        if !entry.is_valid_at(now) {
            debug!(key, age_ms, "Removing expired cache entry");
            store.remove(&storage_key)?;
            return Ok(None);
        }

        debug!(key, age_ms, "Cache hit");
        Ok(Some(entry))
    }

    /// Write `data` under `key` with a fresh timestamp, replacing any
    /// previous entry. On error the previous entry is untouched.
    pub fn save(&self, key: &str, data: &Value) -> Result<(), CacheError> {
        let entry = CacheEntry::new(data.clone(), self.clock.now_ms(), self.ttl_ms);
        let contents = serde_json::to_string(&entry)?;
        self.lock().set(&Self::storage_key(key), &contents)?;
        debug!(key, bytes = contents.len(), "Cached response");
        Ok(())
    }

    /// Apply `patch` to the payload of a valid entry and write it back with
    /// its original timestamp. `patch` returns whether it changed anything.
    /// Returns whether an entry was rewritten; a missing or expired entry is
    /// left alone.
    pub fn update<F>(&self, key: &str, patch: F) -> Result<bool, CacheError>
    where
        F: FnOnce(&mut Value) -> bool,
    {
        let mut store = self.lock();
        let Some(mut entry) = self.load_locked(store.as_mut(), key)? else {
            return Ok(false);
        };
        if !patch(&mut entry.data) {
            return Ok(false);
        }
        let contents = serde_json::to_string(&entry)?;
        store.set(&Self::storage_key(key), &contents)?;
        debug!(key, "Patched cached response");
        Ok(true)
    }

    /// Remove the entry for `key`, returning whether one existed
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.lock().remove(&Self::storage_key(key))?;
        if removed {
            debug!(key, "Invalidated cache entry");
        }
        Ok(removed)
    }

    /// Remove every entry this cache has written. Best-effort: failures are
    /// logged and skipped. Returns the number of entries removed.
    pub fn clear_all(&self) -> usize {
        let mut store = self.lock();
        let keys = match store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list storage keys for cache clear");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(CACHE_PREFIX)) {
            match store.remove(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to remove cache entry"),
            }
        }
        debug!(removed, "Cleared cache");
        removed
    }

    /// Cache keys (without the storage prefix) currently in the store,
    /// expired ones included
    pub fn keys(&self) -> Vec<String> {
        match self.lock().keys() {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(CACHE_PREFIX).map(str::to_string))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list storage keys");
                Vec::new()
            }
        }
    }

    /// Describe every stored entry without evicting anything.
    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        let now = self.clock.now_ms();
        let mut stats = CacheStats {
            entries: Vec::new(),
            used_bytes: store.used_bytes(),
        };

        let keys = store.keys().unwrap_or_default();
        for storage_key in keys {
            let Some(key) = storage_key.strip_prefix(CACHE_PREFIX) else {
                continue;
            };
            let Ok(Some(raw)) = store.get(&storage_key) else {
                continue;
            };
            let info = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => CacheEntryInfo {
                    key: key.to_string(),
                    age: entry.age_display(now),
                    expired: !entry.is_valid_at(now),
                    bytes: raw.len(),
                },
                Err(_) => CacheEntryInfo {
                    key: key.to_string(),
                    age: "unreadable".to_string(),
                    expired: true,
                    bytes: raw.len(),
                },
            };
            stats.entries.push(info);
        }
        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
