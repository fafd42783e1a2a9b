use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::{Cache, EvictCallback};

/// Simple cache implementation with no eviction policy
///
/// This cache stores all entries without any size limits. Entries only leave through
/// `remove`, `clear`, or an expired TTL when one is configured.
pub struct SimpleCache<K, V> {
    /// Current entries in the cache with their insertion time
    entries: RwLock<HashMap<K, (Arc<V>, Instant)>>,

    /// Optional callback when an item is removed
    evict_callback: Option<EvictCallback<K, V>>,

    /// Optional time-to-live for entries
    ttl: Option<Duration>,
}

impl<K, V> fmt::Debug for SimpleCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries_len = self
            .entries
            .read()
            .map(|entries| entries.len())
            .unwrap_or(0);

        f.debug_struct("SimpleCache")
            .field("ttl", &self.ttl)
            .field("entries_len", &entries_len)
            .finish()
    }
}

impl<K, V> SimpleCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a new simple cache
    pub fn new(evict_callback: Option<EvictCallback<K, V>>, ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            evict_callback,
            ttl,
        }
    }

    fn is_expired(&self, inserted: Instant) -> bool {
        self.ttl.map_or(false, |ttl| inserted.elapsed() > ttl)
    }
}

impl<K, V> Cache<K, V> for SimpleCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let expired = {
            let entries = self.entries.read().ok()?;
            let (value, inserted) = entries.get(key)?;
            if !self.is_expired(*inserted) {
                return Some(value.clone());
            }
            true
        };

        if expired {
            self.remove(key);
        }
        None
    }

    fn insert(&self, key: K, value: V) -> bool {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key, (Arc::new(value), Instant::now()));
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &K) -> bool {
        let removed = match self.entries.write() {
            Ok(mut entries) => entries.remove(key),
            Err(_) => None,
        };

        match removed {
            Some((value, _)) => {
                if let Some(callback) = &self.evict_callback {
                    callback(key, &value);
                }
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    fn capacity(&self) -> usize {
        // Simple cache has unlimited capacity
        usize::MAX
    }

    fn clear(&self) {
        let drained: Vec<(K, Arc<V>)> = match self.entries.write() {
            Ok(mut entries) => entries.drain().map(|(k, (v, _))| (k, v)).collect(),
            Err(_) => Vec::new(),
        };

        if let Some(callback) = &self.evict_callback {
            for (key, value) in drained {
                callback(&key, &value);
            }
        }
    }
}
