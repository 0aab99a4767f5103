use std::collections::BTreeMap;

use super::{check_quota, entry_size, KvStore, StoreError, DEFAULT_CAPACITY_BYTES};

/// In-memory store with the same quota behaviour as the file store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    capacity: usize,
    used: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
            used: 0,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let old_size = self
            .entries
            .get(key)
            .map(|old| entry_size(key, old))
            .unwrap_or(0);
        check_quota(self.used, old_size, key, value, self.capacity)?;

        self.used = self.used - old_size + entry_size(key, value);
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        match self.entries.remove(key) {
            Some(old) => {
                self.used -= entry_size(key, &old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn used_bytes(&self) -> usize {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.used_bytes(), 0);
    }

    #[test]
    fn test_quota_exceeded_keeps_old_value() {
        let mut store = MemoryStore::with_capacity(10);
        store.set("k", "12345").unwrap();
        let err = store.set("k", "0123456789").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { needed: 11, capacity: 10 }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("12345"));
        assert_eq!(store.used_bytes(), 6);
    }

    #[test]
    fn test_replacing_value_reuses_its_space() {
        let mut store = MemoryStore::with_capacity(10);
        store.set("k", "123456789").unwrap();
        // Same size again fits because the old value is released
        store.set("k", "abcdefghi").unwrap();
        assert_eq!(store.used_bytes(), 10);
    }
}
