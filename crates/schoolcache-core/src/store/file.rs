//! JSON-file backed store.
//!
//! The whole map is kept in memory and written back on every mutation.
//! Writes go to a sibling temp file which is then renamed over the real
//! one, so a crash mid-write leaves the previous contents intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{check_quota, entry_size, KvStore, StoreError, DEFAULT_CAPACITY_BYTES};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    capacity: usize,
    used: usize,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY_BYTES)
    }

    /// Open the store at `path`, creating parent directories as needed.
    /// An unreadable or corrupt file is discarded and the store starts empty.
    pub fn open_with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = Self::read_entries(&path);
        let used = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        debug!(path = %path.display(), entries = entries.len(), used, "Opened file store");

        Ok(Self {
            path,
            entries,
            capacity,
            used,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding corrupt storage file");
                BTreeMap::new()
            }
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        let contents = serde_json::to_string(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.entries.get(key).cloned();
        let old_size = previous.as_ref().map(|old| entry_size(key, old)).unwrap_or(0);
        check_quota(self.used, old_size, key, value, self.capacity)?;

        self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist() {
            // Roll back so memory matches what is on disk
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        self.used = self.used - old_size + entry_size(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let Some(old) = self.entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist() {
            self.entries.insert(key.to_string(), old);
            return Err(e);
        }
        self.used -= entry_size(key, &old);
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn used_bytes(&self) -> usize {
        self.used
    }
}
