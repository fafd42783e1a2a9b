#![allow(clippy::future_not_send)]

//! # Message Envelope Encryption
//!
//! Per-message envelope encryption for messaging systems.
//!
//! `msgenvelope` provisions a data-encryption key (DEK), seals payloads under it with an
//! AEAD cipher, and describes the DEK in a small serializable [`EnvelopeHandle`] that
//! travels next to the ciphertext as the `envelopeencryption` attribute. The DEK itself is
//! protected by a key-encryption key (KEK) held by a [`KeyManagementService`], or, for the
//! shared-secret backend, is a pre-shared key identified only by its fingerprint.
//!
//! Three backends are available, selected by [`BackendKind`]:
//!
//! - `WrappedEnvelope`: a local keyset encrypted by the KMS, key URI bound as associated data
//! - `ServiceWrappedDirect`: 32 random bytes encrypted by the KMS, AES-256-GCM locally
//! - `SharedSecret`: a caller-supplied key, never leaving the process
//!
//! Restored keys are held in an explicit [`KeyCache`] so each distinct wrapped key costs at
//! most one KMS call per process.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use msgenvelope::kms::StaticKeyManagementService;
//! use msgenvelope::message::{MessageConsumer, MessageProducer};
//! use msgenvelope::policy::EnvelopePolicy;
//! use msgenvelope::{BackendKind, KeyCache, KeyProvisioner};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let master_key = vec![0u8; 32]; // In production, use a real KMS
//! let kms = Arc::new(StaticKeyManagementService::new(master_key)?);
//! let provisioner = Arc::new(KeyProvisioner::new(kms, EnvelopePolicy::new()));
//!
//! let producer = MessageProducer::new(
//!     &provisioner,
//!     BackendKind::ServiceWrappedDirect,
//!     "static://projects/p/keyRings/r/cryptoKeys/k",
//!     None,
//!     None,
//! )
//! .await?;
//! let message = producer.seal(b"secret data", b"")?;
//!
//! // Elsewhere: restore the DEK from the attached handle and open
//! let consumer = MessageConsumer::new(Arc::new(KeyCache::new(provisioner)?));
//! let data = consumer.open(&message, b"").await?;
//! assert_eq!(data, b"secret data");
//! # Ok(())
//! # }
//! ```
//!
//! ## Provisioning directly
//!
//! ```rust,no_run
//! use msgenvelope::policy::EnvelopePolicy;
//! use msgenvelope::{BackendKind, KeyProvisioner, ProvisionRequest, SecretKey};
//!
//! # async fn shared_example() -> Result<(), Box<dyn std::error::Error>> {
//! let provisioner = KeyProvisioner::shared_secret_only(EnvelopePolicy::new());
//! let shared = SecretKey::from("change me to 32 bytes of secret!");
//!
//! let key = provisioner
//!     .provision(ProvisionRequest::mint(BackendKind::SharedSecret, "").with_shared_key(shared.clone()))
//!     .await?;
//! let sealed = key.seal(b"hello", b"aad")?;
//!
//! // The handle carries only the fingerprint; the raw key must be supplied again
//! let restored = provisioner.restore(key.handle(), Some(&shared)).await?;
//! assert_eq!(restored.open(&sealed, b"aad")?, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod key;
pub mod kms;
pub mod message;
pub mod policy;
pub mod provisioner;

// Re-export key types
pub use crate::backend::{KeyBackend, ProvisionedKey};
pub use crate::cache::{Cache, CacheBuilder, CachePolicy};
pub use crate::envelope::{BackendKind, EnvelopeHandle};
pub use crate::error::{Error, Result};
pub use crate::key::cache::KeyCache;
pub use crate::key::SecretKey;
pub use crate::message::{EncryptedMessage, MessageConsumer, MessageProducer};
pub use crate::policy::EnvelopePolicy;
pub use crate::provisioner::{KeyProvisioner, KeyProvisionerBuilder, ProvisionRequest};

/// Size of AES-256 key in bytes
pub const AES256_KEY_SIZE: usize = 32;

/// Message attribute carrying the serialized envelope handle
pub const EXTENSION_NAME: &str = "envelopeencryption";

use async_trait::async_trait;
use std::fmt;

/// Key Management Service interface for wrapping and unwrapping DEKs under a KEK
#[async_trait]
pub trait KeyManagementService: Send + Sync + fmt::Debug {
    /// Encrypts a key under the KEK named by `key_uri`
    async fn encrypt_key(&self, key_uri: &str, key: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts a key previously encrypted under the KEK named by `key_uri`
    async fn decrypt_key(&self, key_uri: &str, encrypted_key: &[u8]) -> Result<Vec<u8>>;
}

/// AEAD (Authenticated Encryption with Associated Data) interface
///
/// Implementations hold their key; callers only supply data.
pub trait Aead: Send + Sync + fmt::Debug {
    /// Seals `plaintext`, authenticating `associated_data` alongside it
    fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;

    /// Opens output of [`Aead::seal`]; the same associated data must be supplied
    fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;
}
