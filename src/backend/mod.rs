//! Key backends
//!
//! Each backend knows how to mint a new DEK and how to restore one from an
//! [`EnvelopeHandle`], producing a [`ProvisionedKey`]: the handle plus a live cipher.
//!
//! | Backend | Wrapped key | AEAD |
//! |---|---|---|
//! | [`WrappedEnvelopeBackend`] | KMS-encrypted keyset (JSON) | keyset AEAD, key URI bound as associated data |
//! | [`ServiceWrappedBackend`] | base64 KMS ciphertext of the raw DEK | AES-256-GCM, nonce prepended |
//! | [`SharedSecretBackend`] | SHA-256 fingerprint of the shared key | AES-GCM, nonce prepended |

mod direct;
mod shared;
mod wrapped;

pub use direct::ServiceWrappedBackend;
pub use shared::SharedSecretBackend;
pub use wrapped::WrappedEnvelopeBackend;

use crate::envelope::{BackendKind, EnvelopeHandle};
use crate::error::Result;
use crate::key::SecretKey;
use crate::Aead;
use async_trait::async_trait;
use metrics::counter;
use std::fmt;
use std::sync::Arc;

/// One key-management strategy
#[async_trait]
pub trait KeyBackend: Send + Sync + fmt::Debug {
    /// The tag this backend handles
    fn kind(&self) -> BackendKind;

    /// Creates a new DEK protected under `key_uri`.
    ///
    /// `shared_key` is only consulted by backends that need caller-supplied key material.
    async fn mint(&self, key_uri: &str, shared_key: Option<&SecretKey>) -> Result<ProvisionedKey>;

    /// Recovers the DEK described by `handle`
    async fn restore(
        &self,
        handle: &EnvelopeHandle,
        shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey>;
}

/// A provisioned key: the serializable handle and the cipher built from it.
///
/// Cloning shares the cipher; raw key bytes are never copied out.
#[derive(Clone)]
pub struct ProvisionedKey {
    handle: EnvelopeHandle,
    cipher: Arc<dyn Aead>,
}

impl fmt::Debug for ProvisionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedKey")
            .field("backend", &self.handle.backend())
            .field("key_uri", &self.handle.key_uri())
            .field("cipher", &self.cipher)
            .finish()
    }
}

impl ProvisionedKey {
    /// Pairs a handle with the cipher it describes
    pub fn new(handle: EnvelopeHandle, cipher: Arc<dyn Aead>) -> Self {
        Self { handle, cipher }
    }

    /// The handle to attach to outgoing messages
    pub fn handle(&self) -> &EnvelopeHandle {
        &self.handle
    }

    /// The live cipher
    pub fn cipher(&self) -> &Arc<dyn Aead> {
        &self.cipher
    }

    /// Seals a payload
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        counter!("msgenvelope.seal", 1);
        self.cipher.seal(plaintext, associated_data)
    }

    /// Opens a payload sealed under the same key and associated data
    pub fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        counter!("msgenvelope.open", 1);
        self.cipher.open(ciphertext, associated_data)
    }
}
