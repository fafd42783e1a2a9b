use super::{KeyBackend, ProvisionedKey};
use crate::crypto::GcmCipher;
use crate::envelope::{BackendKind, EnvelopeHandle};
use crate::error::{Error, Result};
use crate::key::{fingerprints_match, SecretKey};
use async_trait::async_trait;
use std::sync::Arc;

/// Shared-secret backend: a pre-shared key builds the cipher, its fingerprint is the wrapped key.
///
/// No remote calls. Restoring requires the caller to supply the same raw key again; the
/// handle only carries a fingerprint.
#[derive(Debug, Default)]
pub struct SharedSecretBackend;

impl SharedSecretBackend {
    /// Creates the backend
    pub fn new() -> Self {
        Self
    }

    fn cipher(shared_key: Option<&SecretKey>) -> Result<(&SecretKey, GcmCipher)> {
        let key = shared_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingKey("shared-secret backend requires a raw key".into()))?;
        let cipher = GcmCipher::new(key.expose())?;
        Ok((key, cipher))
    }
}

#[async_trait]
impl KeyBackend for SharedSecretBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SharedSecret
    }

    async fn mint(&self, _key_uri: &str, shared_key: Option<&SecretKey>) -> Result<ProvisionedKey> {
        let (key, cipher) = Self::cipher(shared_key)?;

        // The handle is only built once the cipher exists, and only ever sees the fingerprint.
        let handle = EnvelopeHandle::new(self.kind(), "", key.fingerprint());

        log::debug!("provisioned shared key {}", handle.wrapped_key());

        Ok(ProvisionedKey::new(handle, Arc::new(cipher)))
    }

    async fn restore(
        &self,
        handle: &EnvelopeHandle,
        shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey> {
        let (key, cipher) = Self::cipher(shared_key)?;

        if !fingerprints_match(&key.fingerprint(), handle.wrapped_key()) {
            return Err(Error::KeyMismatch);
        }

        log::debug!("restored shared key {}", handle.wrapped_key());

        Ok(ProvisionedKey::new(handle.clone(), Arc::new(cipher)))
    }
}
