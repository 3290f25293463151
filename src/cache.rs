//! Short lived storage for query results

use std::{hash::Hash, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

/// A key value store whose entries expire.
///
/// Writes are atomic per key. While a fresh entry exists, further writes to
/// the same key are refused, so concurrent writers agree on one value.
pub trait Cache<K, V>: Send + Sync {
    /// The stored value, if it has not expired
    fn get(&self, key: &K) -> Option<V>;

    /// Store `value` for `ttl`. Returns `false` when a fresh value was already present.
    fn put(&self, key: K, value: V, ttl: Duration) -> bool;

    /// Drop every expired entry
    fn purge_expired(&self) {}
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In process [`Cache`] backed by a [`DashMap`]
#[derive(Debug)]
pub struct MemoryCache<K: Eq + Hash, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        MemoryCache {
            entries: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> MemoryCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();

        // The shard guard must be released before removing
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        }

        None
    }

    fn put(&self, key: K, value: V, ttl: Duration) -> bool {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now + ttl,
        };

        match self.entries.entry(key) {
            dashmap::Entry::Occupied(occupied) if occupied.get().is_fresh(now) => false,
            dashmap::Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                true
            }
            dashmap::Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
        }
    }

    fn purge_expired(&self) {
        let now = Instant::now();

        self.entries.retain(|_, entry| entry.is_fresh(now));
    }
}
