use super::{KeyBackend, ProvisionedKey};
use crate::crypto::GcmCipher;
use crate::envelope::{BackendKind, EnvelopeHandle};
use crate::error::{Error, Result};
use crate::key::{fingerprint, SecretKey};
use crate::{KeyManagementService, AES256_KEY_SIZE};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

/// Direct backend: the KMS encrypts the raw 32-byte DEK, which also keys a local AES-GCM cipher
#[derive(Debug)]
pub struct ServiceWrappedBackend {
    kms: Arc<dyn KeyManagementService>,
}

impl ServiceWrappedBackend {
    /// Creates the backend over a key-management service
    pub fn new(kms: Arc<dyn KeyManagementService>) -> Self {
        Self { kms }
    }
}

#[async_trait]
impl KeyBackend for ServiceWrappedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ServiceWrappedDirect
    }

    async fn mint(&self, key_uri: &str, _shared_key: Option<&SecretKey>) -> Result<ProvisionedKey> {
        if key_uri.is_empty() {
            return Err(Error::InvalidArgument(
                "service-wrapped backend requires a key URI".into(),
            ));
        }

        let dek = SecretKey::generate(AES256_KEY_SIZE);
        let cipher = GcmCipher::new(dek.expose())?;

        let wrapped = self
            .kms
            .encrypt_key(key_uri, dek.expose())
            .await
            .map_err(Error::remote)?;
        let handle = EnvelopeHandle::new(self.kind(), key_uri, STANDARD.encode(wrapped));

        log::debug!(
            "minted DEK under {} (wrapped sha256 {})",
            key_uri,
            fingerprint(handle.wrapped_key().as_bytes())
        );

        Ok(ProvisionedKey::new(handle, Arc::new(cipher)))
    }

    async fn restore(
        &self,
        handle: &EnvelopeHandle,
        _shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey> {
        if handle.wrapped_key().is_empty() {
            return Err(Error::CorruptEnvelope("wrapped DEK is empty".into()));
        }

        let wrapped = STANDARD
            .decode(handle.wrapped_key())
            .map_err(|e| Error::CorruptEnvelope(format!("could not decode DEK: {}", e)))?;

        let dek = SecretKey::new(
            self.kms
                .decrypt_key(handle.key_uri(), &wrapped)
                .await
                .map_err(Error::remote)?,
        );
        let cipher = GcmCipher::new(dek.expose())?;

        log::debug!("restored DEK under {}", handle.key_uri());

        Ok(ProvisionedKey::new(handle.clone(), Arc::new(cipher)))
    }
}
