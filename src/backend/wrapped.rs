use super::{KeyBackend, ProvisionedKey};
use crate::crypto::{EncryptedKeyset, Keyset, KeysetAead};
use crate::envelope::{BackendKind, EnvelopeHandle};
use crate::error::{Error, Result};
use crate::key::{fingerprint, SecretKey};
use crate::{Aead, KeyManagementService};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Keyset AEAD whose associated data is prefixed with the KEK's URI.
///
/// With empty caller associated data the binding is exactly the key URI.
struct UriBoundAead {
    key_uri: String,
    inner: KeysetAead,
}

impl fmt::Debug for UriBoundAead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriBoundAead")
            .field("key_uri", &self.key_uri)
            .field("inner", &self.inner)
            .finish()
    }
}

impl UriBoundAead {
    fn bind(&self, associated_data: &[u8]) -> Vec<u8> {
        let mut bound = Vec::with_capacity(self.key_uri.len() + associated_data.len());
        bound.extend_from_slice(self.key_uri.as_bytes());
        bound.extend_from_slice(associated_data);
        bound
    }
}

impl Aead for UriBoundAead {
    fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        self.inner.seal(plaintext, &self.bind(associated_data))
    }

    fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        self.inner.open(ciphertext, &self.bind(associated_data))
    }
}

/// Envelope backend: a local keyset encrypted by the KMS travels as the wrapped key
#[derive(Debug)]
pub struct WrappedEnvelopeBackend {
    kms: Arc<dyn KeyManagementService>,
}

impl WrappedEnvelopeBackend {
    /// Creates the backend over a key-management service
    pub fn new(kms: Arc<dyn KeyManagementService>) -> Self {
        Self { kms }
    }
}

#[async_trait]
impl KeyBackend for WrappedEnvelopeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WrappedEnvelope
    }

    async fn mint(&self, key_uri: &str, _shared_key: Option<&SecretKey>) -> Result<ProvisionedKey> {
        if key_uri.is_empty() {
            return Err(Error::InvalidArgument(
                "wrapped-envelope backend requires a key URI".into(),
            ));
        }

        let keyset = Keyset::generate();
        let aead = KeysetAead::new(&keyset)?;

        let plaintext = keyset.to_bytes()?;
        let ciphertext = self
            .kms
            .encrypt_key(key_uri, &plaintext)
            .await
            .map_err(Error::remote)?;

        let encrypted = EncryptedKeyset {
            encrypted_keyset: STANDARD.encode(ciphertext),
            keyset_info: keyset.info(),
        };
        let handle = EnvelopeHandle::new(self.kind(), key_uri, encrypted.to_json()?);

        log::debug!(
            "minted keyset {} under {} (wrapped sha256 {})",
            keyset.primary_key_id,
            key_uri,
            fingerprint(handle.wrapped_key().as_bytes())
        );

        Ok(ProvisionedKey::new(
            handle,
            Arc::new(UriBoundAead {
                key_uri: key_uri.to_string(),
                inner: aead,
            }),
        ))
    }

    async fn restore(
        &self,
        handle: &EnvelopeHandle,
        _shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey> {
        let encrypted = EncryptedKeyset::from_json(handle.wrapped_key())?;
        let ciphertext = encrypted.ciphertext()?;

        let plaintext = Zeroizing::new(
            self.kms
                .decrypt_key(handle.key_uri(), &ciphertext)
                .await
                .map_err(Error::remote)?,
        );

        let keyset = Keyset::from_bytes(&plaintext)?;
        if keyset.primary_key_id != encrypted.keyset_info.primary_key_id {
            return Err(Error::CorruptEnvelope(format!(
                "keyset primary key {} does not match keyset info {}",
                keyset.primary_key_id, encrypted.keyset_info.primary_key_id
            )));
        }

        let aead = KeysetAead::new(&keyset)?;

        log::debug!(
            "restored keyset {} under {}",
            keyset.primary_key_id,
            handle.key_uri()
        );

        Ok(ProvisionedKey::new(
            handle.clone(),
            Arc::new(UriBoundAead {
                key_uri: handle.key_uri().to_string(),
                inner: aead,
            }),
        ))
    }
}
