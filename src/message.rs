//! Transport-agnostic message sealing.
//!
//! A [`MessageProducer`] seals payloads under one provisioned key and attaches the
//! serialized [`EnvelopeHandle`] as the `envelopeencryption` attribute. A
//! [`MessageConsumer`] reads the attribute back, resolves the key through a [`KeyCache`]
//! and opens the payload. Binding these to a concrete transport is left to the caller.

use crate::backend::ProvisionedKey;
use crate::envelope::{BackendKind, EnvelopeHandle};
use crate::error::{Error, Result};
use crate::key::cache::KeyCache;
use crate::key::{fingerprint, SecretKey};
use crate::provisioner::{KeyProvisioner, ProvisionRequest};
use crate::EXTENSION_NAME;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A sealed payload and the handle needed to open it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// Serialized envelope handle, the value of the `envelopeencryption` attribute
    pub extension: String,

    /// Base64 of the sealed payload
    pub data: String,
}

impl EncryptedMessage {
    /// Name of the attribute carrying [`EncryptedMessage::extension`]
    pub fn extension_name(&self) -> &'static str {
        EXTENSION_NAME
    }

    /// Parses the attached handle
    pub fn handle(&self) -> Result<EnvelopeHandle> {
        EnvelopeHandle::from_json(&self.extension)
    }
}

/// Seals outgoing payloads under a single key minted at construction
#[derive(Debug)]
pub struct MessageProducer {
    key: ProvisionedKey,
    extension: String,
}

impl MessageProducer {
    /// Mints a key for `backend` under `key_uri`.
    ///
    /// When a cache is given the new key is registered in it, so a consumer sharing the
    /// cache opens these messages without a KMS round trip.
    pub async fn new(
        provisioner: &KeyProvisioner,
        backend: BackendKind,
        key_uri: &str,
        shared_key: Option<SecretKey>,
        cache: Option<&KeyCache>,
    ) -> Result<Self> {
        let mut request = ProvisionRequest::mint(backend, key_uri);
        if let Some(key) = shared_key {
            request = request.with_shared_key(key);
        }

        let key = provisioner.provision(request).await?;
        if let Some(cache) = cache {
            cache.insert(key.clone());
        }

        Self::from_key(key)
    }

    /// Wraps an already provisioned key
    pub fn from_key(key: ProvisionedKey) -> Result<Self> {
        let extension = key.handle().to_json()?;
        Ok(Self { key, extension })
    }

    /// Handle attached to every message from this producer
    pub fn handle(&self) -> &EnvelopeHandle {
        self.key.handle()
    }

    /// Seals one payload
    pub fn seal(&self, payload: &[u8], associated_data: &[u8]) -> Result<EncryptedMessage> {
        let sealed = self.key.seal(payload, associated_data)?;

        log::debug!(
            "sealed {} bytes under {} key {}",
            payload.len(),
            self.key.handle().backend(),
            fingerprint(self.key.handle().wrapped_key().as_bytes())
        );

        Ok(EncryptedMessage {
            extension: self.extension.clone(),
            data: STANDARD.encode(sealed),
        })
    }
}

/// Opens incoming messages, restoring each distinct key once
#[derive(Debug)]
pub struct MessageConsumer {
    cache: Arc<KeyCache>,
    shared_key: Option<SecretKey>,
}

impl MessageConsumer {
    /// Creates a consumer resolving keys through `cache`
    pub fn new(cache: Arc<KeyCache>) -> Self {
        Self {
            cache,
            shared_key: None,
        }
    }

    /// Raw key used to restore shared-secret handles
    pub fn with_shared_key(mut self, key: SecretKey) -> Self {
        self.shared_key = Some(key);
        self
    }

    /// The cache backing this consumer
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Opens a message.
    ///
    /// A malformed attribute is `CorruptEnvelope`; a payload that is not base64 is
    /// `MalformedCiphertext`.
    pub async fn open(
        &self,
        message: &EncryptedMessage,
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let handle = message.handle()?;
        let key = self.cache.resolve(&handle, self.shared_key.as_ref()).await?;

        let sealed = STANDARD
            .decode(&message.data)
            .map_err(|e| Error::MalformedCiphertext(format!("payload is not base64: {}", e)))?;

        key.open(&sealed, associated_data)
    }
}
