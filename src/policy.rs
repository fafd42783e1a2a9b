use std::time;

/// Default values for EnvelopePolicy
pub const DEFAULT_KMS_TIMEOUT: time::Duration = time::Duration::from_secs(10);
pub const DEFAULT_KEY_CACHE_MAX_SIZE: usize = 1000;
pub const DEFAULT_KEY_CACHE_EVICTION_POLICY: &str = "lru";

/// Policy for key provisioning and caching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopePolicy {
    /// Deadline applied to each provisioning call that reaches the key-management service
    pub kms_timeout: time::Duration,

    /// Maximum number of provisioned keys held by a key cache
    pub key_cache_max_size: usize,

    /// Eviction policy for the key cache, `"lru"` or `"simple"`
    pub key_cache_eviction_policy: String,

    /// Optional time-to-live for cached keys. `None` keeps them until evicted.
    pub key_cache_ttl: Option<time::Duration>,
}

impl Default for EnvelopePolicy {
    fn default() -> Self {
        Self {
            kms_timeout: DEFAULT_KMS_TIMEOUT,
            key_cache_max_size: DEFAULT_KEY_CACHE_MAX_SIZE,
            key_cache_eviction_policy: DEFAULT_KEY_CACHE_EVICTION_POLICY.to_string(),
            key_cache_ttl: None,
        }
    }
}

impl EnvelopePolicy {
    /// Creates a new EnvelopePolicy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline for remote key-management calls
    ///
    /// # Example
    /// ```
    /// use msgenvelope::policy::EnvelopePolicy;
    /// use std::time::Duration;
    ///
    /// let policy = EnvelopePolicy::new().with_kms_timeout(Duration::from_secs(2));
    /// assert_eq!(policy.kms_timeout, Duration::from_secs(2));
    /// ```
    pub fn with_kms_timeout(mut self, timeout: time::Duration) -> Self {
        self.kms_timeout = timeout;
        self
    }

    /// Sets the key cache max size
    pub fn with_key_cache_max_size(mut self, size: usize) -> Self {
        self.key_cache_max_size = size;
        self
    }

    /// Sets the key cache eviction policy
    pub fn with_key_cache_policy(mut self, policy_name: impl Into<String>) -> Self {
        self.key_cache_eviction_policy = policy_name.into();
        self
    }

    /// Expires cached keys after the given duration.
    ///
    /// After a KEK rotation, stale contexts age out instead of living until restart.
    pub fn with_key_cache_ttl(mut self, ttl: time::Duration) -> Self {
        self.key_cache_ttl = Some(ttl);
        self
    }
}
