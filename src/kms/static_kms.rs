use crate::crypto::GcmCipher;
use crate::error::{Error, Result};
use crate::{Aead, KeyManagementService};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;

/// A static key management service for testing
///
/// Every key URI shares one master key, but the URI is bound as associated data, so a
/// key wrapped under one URI does not unwrap under another. This should not be used in
/// production.
pub struct StaticKeyManagementService {
    /// AEAD over the static master key
    master: GcmCipher,
    /// When set, only these URIs are served
    known_uris: Option<HashSet<String>>,
}

impl fmt::Debug for StaticKeyManagementService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyManagementService")
            .field("master", &"<hidden>")
            .field("known_uris", &self.known_uris)
            .finish()
    }
}

impl StaticKeyManagementService {
    /// Creates a new StaticKeyManagementService with the given master key
    pub fn new(master_key: Vec<u8>) -> Result<Self> {
        let master = GcmCipher::new(&master_key)?;
        Ok(Self {
            master,
            known_uris: None,
        })
    }

    /// Restricts the service to the given key URIs; any other URI fails like a missing KEK
    pub fn with_known_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_uris = Some(uris.into_iter().map(Into::into).collect());
        self
    }

    fn check_uri(&self, key_uri: &str) -> Result<()> {
        match &self.known_uris {
            Some(known) if !known.contains(key_uri) => Err(Error::BackendUnavailable(format!(
                "key {} not found",
                key_uri
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KeyManagementService for StaticKeyManagementService {
    async fn encrypt_key(&self, key_uri: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.check_uri(key_uri)?;
        self.master.seal(key, key_uri.as_bytes())
    }

    async fn decrypt_key(&self, key_uri: &str, encrypted_key: &[u8]) -> Result<Vec<u8>> {
        self.check_uri(key_uri)?;
        self.master.open(encrypted_key, key_uri.as_bytes())
    }
}
