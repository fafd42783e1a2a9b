// Module for common test utilities and fixtures used across integration tests

use async_trait::async_trait;
use msgenvelope::{
    kms::StaticKeyManagementService, policy::EnvelopePolicy, KeyManagementService,
    KeyProvisioner, Result, SecretKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

// Constants for tests
pub const KEY_URI: &str = "static://projects/p/locations/global/keyRings/r/cryptoKeys/k";
pub const OTHER_KEY_URI: &str = "static://projects/p/locations/global/keyRings/r/cryptoKeys/k2";
pub const ORIGINAL_DATA: &str = "somesupersecretstring!hjdkashfjkdashfd";
pub const STATIC_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";
pub const SHARED_KEY: &str = "gUkXp2s5v8y/B?E(H+KbPeShVmYq3t6w";

static INIT: Once = Once::new();

// Route `log` output through env_logger when RUST_LOG is set
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

// Create a static KMS for testing
pub fn create_static_kms() -> Arc<StaticKeyManagementService> {
    let key_bytes = hex::decode(STATIC_KEY).expect("Invalid hex key");
    Arc::new(StaticKeyManagementService::new(key_bytes).expect("Invalid static key"))
}

pub fn create_shared_key() -> SecretKey {
    SecretKey::from(SHARED_KEY)
}

pub fn create_provisioner(kms: Arc<dyn KeyManagementService>) -> Arc<KeyProvisioner> {
    init_logging();
    Arc::new(KeyProvisioner::new(kms, EnvelopePolicy::default()))
}

// A KMS wrapper that counts operations
#[derive(Debug)]
pub struct CountingKms {
    inner: Arc<dyn KeyManagementService>,
    encrypt_count: AtomicUsize,
    decrypt_count: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingKms {
    pub fn new(inner: Arc<dyn KeyManagementService>) -> Self {
        Self {
            inner,
            encrypt_count: AtomicUsize::new(0),
            decrypt_count: AtomicUsize::new(0),
            delay: None,
        }
    }

    // Each decrypt sleeps first, widening the window for concurrent misses
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn encrypt_count(&self) -> usize {
        self.encrypt_count.load(Ordering::SeqCst)
    }

    pub fn decrypt_count(&self) -> usize {
        self.decrypt_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyManagementService for CountingKms {
    async fn encrypt_key(&self, key_uri: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.encrypt_count.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt_key(key_uri, key).await
    }

    async fn decrypt_key(&self, key_uri: &str, encrypted_key: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.decrypt_key(key_uri, encrypted_key).await
    }
}

// A KMS that never answers within any reasonable deadline
#[derive(Debug)]
pub struct SlowKms {
    pub delay: Duration,
}

#[async_trait]
impl KeyManagementService for SlowKms {
    async fn encrypt_key(&self, _key_uri: &str, key: &[u8]) -> Result<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        Ok(key.to_vec())
    }

    async fn decrypt_key(&self, _key_uri: &str, encrypted_key: &[u8]) -> Result<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        Ok(encrypted_key.to_vec())
    }
}

// A KMS that is always down
#[derive(Debug)]
pub struct FailingKms;

#[async_trait]
impl KeyManagementService for FailingKms {
    async fn encrypt_key(&self, _key_uri: &str, _key: &[u8]) -> Result<Vec<u8>> {
        Err(msgenvelope::Error::BackendUnavailable("connection refused".into()))
    }

    async fn decrypt_key(&self, _key_uri: &str, _encrypted_key: &[u8]) -> Result<Vec<u8>> {
        Err(msgenvelope::Error::Crypto("permission denied".into()))
    }
}
