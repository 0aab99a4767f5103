//! Durable key-value storage.
//!
//! This module provides the synchronous, string-keyed storage medium that
//! cache entries are persisted to. It mirrors browser local storage:
//! string keys, string values, and a fixed capacity in bytes.
//!
//! - `MemoryStore`: in-process map, nothing survives the process
//! - `FileStore`: the whole map as one JSON document on disk

pub mod file;
pub mod memory;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Default capacity, matching the common browser local storage quota.
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: {needed} bytes needed, capacity is {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    /// On error the previous value is left in place.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`, returning whether it was present
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Bytes currently used (keys plus values)
    fn used_bytes(&self) -> usize;
}

/// Size a key/value pair counts against the capacity.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Check that replacing `key`'s current value (of `old_size` bytes) with
/// `value` stays within `capacity`.
pub(crate) fn check_quota(
    used: usize,
    old_size: usize,
    key: &str,
    value: &str,
    capacity: usize,
) -> Result<(), StoreError> {
    let needed = used - old_size + entry_size(key, value);
    if needed > capacity {
        return Err(StoreError::QuotaExceeded { needed, capacity });
    }
    Ok(())
}
