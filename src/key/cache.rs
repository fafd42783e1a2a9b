use crate::backend::ProvisionedKey;
use crate::cache::{Cache, CacheBuilder, CachePolicy};
use crate::envelope::EnvelopeHandle;
use crate::error::{Error, Result};
use crate::key::SecretKey;
use crate::provisioner::KeyProvisioner;
use metrics::counter;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Parse a string cache policy name to a CachePolicy enum
pub fn parse_cache_policy(policy_str: &str) -> Option<CachePolicy> {
    policy_str.parse().ok()
}

/// Maps wrapped keys to provisioned keys so each DEK is restored at most once.
///
/// The cache key is the handle's wrapped key; for shared-secret handles that is the key
/// fingerprint. A miss restores through the provisioner outside any lock. Concurrent
/// misses for the same wrapped key wait on a per-key gate, so the KMS sees one restore
/// call, and a failed restore leaves the cache untouched.
pub struct KeyCache {
    provisioner: Arc<KeyProvisioner>,
    entries: Arc<dyn Cache<String, ProvisionedKey>>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("entries", &self.entries)
            .finish()
    }
}

impl KeyCache {
    /// Creates a cache sized and configured by the provisioner's policy
    pub fn new(provisioner: Arc<KeyProvisioner>) -> Result<Self> {
        let policy = provisioner.policy();
        let eviction = parse_cache_policy(&policy.key_cache_eviction_policy).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown key cache eviction policy: {}",
                policy.key_cache_eviction_policy
            ))
        })?;

        let mut builder = CacheBuilder::new(policy.key_cache_max_size)
            .with_policy(eviction)
            .with_evict_callback(|wrapped: &String, key: &ProvisionedKey| {
                log::debug!(
                    "evicted {} key {}",
                    key.handle().backend(),
                    crate::key::fingerprint(wrapped.as_bytes())
                );
            });
        if let Some(ttl) = policy.key_cache_ttl {
            builder = builder.with_ttl(ttl);
        }

        Ok(Self::with_cache(provisioner, builder.build()?))
    }

    /// Creates a cache over a caller-supplied store
    pub fn with_cache(
        provisioner: Arc<KeyProvisioner>,
        entries: Arc<dyn Cache<String, ProvisionedKey>>,
    ) -> Self {
        Self {
            provisioner,
            entries,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The provisioner used on a miss
    pub fn provisioner(&self) -> &Arc<KeyProvisioner> {
        &self.provisioner
    }

    fn lookup(&self, handle: &EnvelopeHandle) -> Option<ProvisionedKey> {
        let cached = self.entries.get(&handle.cache_key().to_string())?;
        // Same wrapped key under a different URI or backend is a different envelope.
        if cached.handle() == handle {
            Some(ProvisionedKey::clone(&cached))
        } else {
            None
        }
    }

    /// Returns the cached key for `handle` without provisioning
    pub fn get(&self, handle: &EnvelopeHandle) -> Option<ProvisionedKey> {
        self.lookup(handle)
    }

    fn inflight(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the key for `handle`, restoring it on a miss.
    ///
    /// `shared_key` is required for shared-secret handles and ignored otherwise.
    pub async fn resolve(
        &self,
        handle: &EnvelopeHandle,
        shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey> {
        if let Some(hit) = self.lookup(handle) {
            counter!("msgenvelope.cache.hit", 1);
            return Ok(hit);
        }

        let cache_key = handle.cache_key().to_string();
        let gate = self
            .inflight()
            .entry(cache_key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        let result = {
            let _guard = gate.lock().await;

            // Another caller may have restored it while we waited.
            match self.lookup(handle) {
                Some(hit) => {
                    counter!("msgenvelope.cache.hit", 1);
                    Ok(hit)
                }
                None => {
                    counter!("msgenvelope.cache.miss", 1);
                    log::debug!(
                        "key cache miss for {} key {}",
                        handle.backend(),
                        crate::key::fingerprint(cache_key.as_bytes())
                    );

                    let restored = self.provisioner.restore(handle, shared_key).await;
                    if let Ok(key) = &restored {
                        self.entries.insert(cache_key.clone(), key.clone());
                    }
                    restored
                }
            }
        };

        // Waiters still holding this gate re-check the cache once they get it, so the
        // entry can go as soon as our turn is over.
        let mut inflight = self.inflight();
        if inflight
            .get(&cache_key)
            .is_some_and(|existing| Arc::ptr_eq(existing, &gate))
        {
            inflight.remove(&cache_key);
        }

        result
    }

    /// Registers a freshly minted key so later lookups of its handle skip the KMS
    pub fn insert(&self, key: ProvisionedKey) {
        let cache_key = key.handle().cache_key().to_string();
        self.entries.insert(cache_key, key);
    }

    /// Removes the key for `handle`, returning whether one was cached
    pub fn evict(&self, handle: &EnvelopeHandle) -> bool {
        self.entries.remove(&handle.cache_key().to_string())
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached key
    pub fn clear(&self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight().len()
    }
}
