//! A time-to-live key/value store.
//!
//! Entries are never evicted. Staleness is decided lazily by the reader, which may
//! still choose to serve a stale value when nothing fresher exists.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
    value: Arc<V>,
    created_at: Instant,
    ttl: Duration,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        CacheEntry {
            value: Arc::clone(&self.value),
            created_at: self.created_at,
            ttl: self.ttl,
        }
    }
}

impl<V> CacheEntry<V> {
    pub(crate) fn value(&self) -> &Arc<V> {
        &self.value
    }

    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh while `now < created_at + ttl`.
    pub(crate) fn is_fresh_at(&self, now: Instant) -> bool {
        match self.created_at.checked_add(self.ttl) {
            Some(expires_at) => now < expires_at,
            // A ttl too large to represent never expires.
            None => true,
        }
    }

    pub(crate) fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }
}

/// Writers swap whole entries under the lock, so a reader sees either the old
/// value or the new one.
#[derive(Debug)]
pub(crate) struct CacheStore<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        CacheStore {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> CacheStore<V> {
    pub(crate) fn new() -> CacheStore<V> {
        CacheStore::default()
    }

    pub(crate) fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        entries.get(key).cloned()
    }

    pub(crate) fn set<K: Into<String>>(&self, key: K, value: Arc<V>, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    pub(crate) fn set_at<K: Into<String>>(
        &self,
        key: K,
        value: Arc<V>,
        ttl: Duration,
        created_at: Instant,
    ) {
        let entry = CacheEntry {
            value,
            created_at,
            ttl,
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        entries.insert(key.into(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let store: CacheStore<u32> = CacheStore::new();

        assert!(store.get("catalog").is_none());
    }

    #[test]
    fn entry_is_fresh_until_ttl_elapses() {
        let store = CacheStore::new();
        let t0 = Instant::now();
        let ttl = Duration::from_secs(60);

        store.set_at("catalog", Arc::new(7u32), ttl, t0);

        let entry = store.get("catalog").expect("entry should be present");

        assert_eq!(**entry.value(), 7);
        assert_eq!(entry.ttl(), ttl);
        assert_eq!(entry.created_at(), t0);
        assert!(entry.is_fresh_at(t0));
        assert!(entry.is_fresh_at(t0 + ttl - Duration::from_millis(1)));
        assert!(!entry.is_fresh_at(t0 + ttl));
        assert!(!entry.is_fresh_at(t0 + ttl * 10));
    }

    #[test]
    fn stale_entries_are_still_returned() {
        let store = CacheStore::new();
        let t0 = Instant::now();

        store.set_at("catalog", Arc::new("old"), Duration::from_secs(1), t0);

        let entry = store.get("catalog").expect("stale entries are not evicted");

        assert!(!entry.is_fresh_at(t0 + Duration::from_secs(120)));
        assert_eq!(**entry.value(), "old");
    }

    #[test]
    fn set_replaces_the_whole_entry() {
        let store = CacheStore::new();

        store.set("catalog", Arc::new(vec![1, 2, 3]), Duration::from_secs(10));
        let before = store.get("catalog").unwrap();

        store.set("catalog", Arc::new(vec![4]), Duration::from_secs(20));
        let after = store.get("catalog").unwrap();

        assert_eq!(**before.value(), vec![1, 2, 3]);
        assert_eq!(**after.value(), vec![4]);
        assert_eq!(after.ttl(), Duration::from_secs(20));
    }

    #[test]
    fn zero_ttl_is_never_fresh() {
        let store = CacheStore::new();
        let t0 = Instant::now();

        store.set_at("catalog", Arc::new(()), Duration::ZERO, t0);

        assert!(!store.get("catalog").unwrap().is_fresh_at(t0));
    }
}
