//! In-memory caches with pluggable eviction
//!
//! - LRU (Least Recently Used), bounded by capacity
//! - Simple: unbounded, never evicts on its own
//!
//! Both support an optional time-to-live and an eviction callback.

mod lru;
mod simple;

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

pub use lru::LruCache;
pub use simple::SimpleCache;

/// Cache policy types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Least Recently Used
    LRU,
    /// Simple (no eviction)
    Simple,
}

impl Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePolicy::LRU => write!(f, "lru"),
            CachePolicy::Simple => write!(f, "simple"),
        }
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lru" | "" => Ok(CachePolicy::LRU),
            "simple" => Ok(CachePolicy::Simple),
            other => Err(Error::InvalidArgument(format!(
                "unknown cache eviction policy: {}",
                other
            ))),
        }
    }
}

/// A callback function called when an item is evicted from the cache
pub type EvictCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Cache interface for different implementations
pub trait Cache<K, V>: Send + Sync + Debug {
    /// Get a value from the cache
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Insert a value into the cache, replacing any previous value for the key
    fn insert(&self, key: K, value: V) -> bool;

    /// Remove a value from the cache
    fn remove(&self, key: &K) -> bool;

    /// Return the number of items in the cache
    fn len(&self) -> usize;

    /// Return true if the cache is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the capacity of the cache
    fn capacity(&self) -> usize;

    /// Clear all items from the cache
    fn clear(&self);
}

/// Builder for creating cache instances
pub struct CacheBuilder<K, V> {
    capacity: usize,
    policy: CachePolicy,
    evict_callback: Option<EvictCallback<K, V>>,
    ttl: Option<Duration>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + Debug + 'static,
    V: Send + Sync + 'static,
{
    /// Create a new cache builder with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            policy: CachePolicy::LRU,
            evict_callback: None,
            ttl: None,
        }
    }

    /// Set the cache policy
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the eviction callback
    pub fn with_evict_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.evict_callback = Some(Arc::new(callback));
        self
    }

    /// Set the time-to-live for cache entries
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Build the cache with the configured options
    pub fn build(self) -> Result<Arc<dyn Cache<K, V>>> {
        match self.policy {
            CachePolicy::LRU => {
                if self.capacity == 0 {
                    return Err(Error::InvalidArgument(
                        "LRU cache capacity must be greater than zero".into(),
                    ));
                }
                let cache = LruCache::new(self.capacity, self.evict_callback, self.ttl);
                Ok(Arc::new(cache))
            }
            CachePolicy::Simple => {
                let cache = SimpleCache::new(self.evict_callback, self.ttl);
                Ok(Arc::new(cache))
            }
        }
    }
}
