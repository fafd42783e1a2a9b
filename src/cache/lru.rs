use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{Cache, EvictCallback};

struct Entry<V> {
    value: Arc<V>,
    inserted: Instant,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Most recently used at the front
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_front(key.clone());
    }

    fn take(&mut self, key: &K) -> Option<Arc<V>> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry.value)
    }
}

/// LRU (Least Recently Used) cache implementation
///
/// Entries and recency order sit behind one lock so they can never disagree.
/// Eviction callbacks run after the lock is released.
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,

    /// Maximum number of entries in the cache
    capacity: usize,

    /// Optional callback when an item is evicted
    evict_callback: Option<EvictCallback<K, V>>,

    /// Optional time-to-live for entries, measured from insertion
    ttl: Option<Duration>,
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries_len = self
            .inner
            .lock()
            .map(|inner| inner.entries.len())
            .unwrap_or(0);

        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("entries_len", &entries_len)
            .finish()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a new LRU cache with the given capacity
    pub fn new(
        capacity: usize,
        evict_callback: Option<EvictCallback<K, V>>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            evict_callback,
            ttl,
        }
    }

    // Cached values are immutable once inserted, so a panic mid-update cannot leave a
    // half-written value behind; keep serving after poisoning.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted.elapsed() > ttl,
            None => false,
        }
    }

    fn notify(&self, evicted: Vec<(K, Arc<V>)>) {
        if let Some(callback) = &self.evict_callback {
            for (key, value) in evicted {
                callback(&key, &value);
            }
        }
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) => self.is_expired(entry),
            None => return None,
        };

        if expired {
            let value = inner.take(key);
            drop(inner);
            if let Some(value) = value {
                self.notify(vec![(key.clone(), value)]);
            }
            return None;
        }

        inner.touch(key);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    fn insert(&self, key: K, value: V) -> bool {
        let mut evicted = Vec::new();
        {
            let mut inner = self.lock();

            // Replacing an existing key never pushes anything else out.
            if !inner.entries.contains_key(&key) {
                while inner.entries.len() >= self.capacity {
                    let Some(oldest) = inner.order.pop_back() else {
                        break;
                    };
                    if let Some(entry) = inner.entries.remove(&oldest) {
                        evicted.push((oldest, entry.value));
                    }
                }
            }

            inner.entries.insert(
                key.clone(),
                Entry {
                    value: Arc::new(value),
                    inserted: Instant::now(),
                },
            );
            inner.touch(&key);
        }

        self.notify(evicted);
        true
    }

    fn remove(&self, key: &K) -> bool {
        let value = self.lock().take(key);
        match value {
            Some(value) => {
                self.notify(vec![(key.clone(), value)]);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) {
        let evicted: Vec<(K, Arc<V>)> = {
            let mut inner = self.lock();
            inner.order.clear();
            inner
                .entries
                .drain()
                .map(|(key, entry)| (key, entry.value))
                .collect()
        };
        self.notify(evicted);
    }
}
