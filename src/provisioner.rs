//! Provisioning: turn a backend, a KEK URI and an optional existing wrapped key into a
//! [`ProvisionedKey`].
//!
//! A request without a wrapped key mints a fresh DEK; one with a wrapped key restores the
//! DEK it describes, and an empty wrapped key on restore is a corrupt envelope.
//! Every call into a backend runs under a deadline, and an expired deadline is reported
//! as [`Error::BackendUnavailable`]. Nothing is retried here.

use crate::backend::{
    KeyBackend, ProvisionedKey, ServiceWrappedBackend, SharedSecretBackend,
    WrappedEnvelopeBackend,
};
use crate::envelope::{BackendKind, EnvelopeHandle};
use crate::error::{Error, Result};
use crate::key::SecretKey;
use crate::policy::EnvelopePolicy;
use crate::KeyManagementService;
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Input to [`KeyProvisioner::provision`]
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    backend: BackendKind,
    key_uri: String,
    wrapped_key: Option<String>,
    shared_key: Option<SecretKey>,
    timeout: Option<Duration>,
}

impl ProvisionRequest {
    /// Builds a request the way handles arrive off the wire: an empty `existing` wrapped key
    /// mints, anything else restores
    pub fn new(backend: BackendKind, key_uri: impl Into<String>, existing: impl Into<String>) -> Self {
        let existing = existing.into();
        Self {
            backend,
            key_uri: key_uri.into(),
            wrapped_key: if existing.is_empty() {
                None
            } else {
                Some(existing)
            },
            shared_key: None,
            timeout: None,
        }
    }

    /// Requests a freshly minted DEK
    pub fn mint(backend: BackendKind, key_uri: impl Into<String>) -> Self {
        Self::new(backend, key_uri, "")
    }

    /// Requests the DEK described by an existing handle.
    ///
    /// This always restores; a handle with an empty wrapped key is rejected by
    /// [`KeyProvisioner::provision`] rather than minted.
    pub fn restore(handle: &EnvelopeHandle) -> Self {
        Self {
            backend: handle.backend(),
            key_uri: handle.key_uri().to_string(),
            wrapped_key: Some(handle.wrapped_key().to_string()),
            shared_key: None,
            timeout: None,
        }
    }

    /// Supplies the raw key for the shared-secret backend
    pub fn with_shared_key(mut self, key: SecretKey) -> Self {
        self.shared_key = Some(key);
        self
    }

    /// Overrides the policy's KMS deadline for this call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// True when this request carries an existing wrapped key
    pub fn is_restore(&self) -> bool {
        self.wrapped_key.is_some()
    }

    /// Backend the request targets
    pub fn backend(&self) -> BackendKind {
        self.backend
    }
}

/// Dispatches provisioning requests to the registered backends
#[derive(Debug)]
pub struct KeyProvisioner {
    backends: HashMap<BackendKind, Arc<dyn KeyBackend>>,
    policy: EnvelopePolicy,
}

impl KeyProvisioner {
    /// Starts a builder with no backends registered
    pub fn builder() -> KeyProvisionerBuilder {
        KeyProvisionerBuilder::default()
    }

    /// A provisioner with all three backends, the KMS-backed ones sharing `kms`
    pub fn new(kms: Arc<dyn KeyManagementService>, policy: EnvelopePolicy) -> Self {
        Self::builder()
            .with_kms(kms)
            .with_policy(policy)
            .build_unchecked()
    }

    /// A provisioner that only serves the shared-secret backend and never talks to a KMS
    pub fn shared_secret_only(policy: EnvelopePolicy) -> Self {
        Self::builder()
            .with_backend(Arc::new(SharedSecretBackend::new()))
            .with_policy(policy)
            .build_unchecked()
    }

    /// Policy this provisioner was built with
    pub fn policy(&self) -> &EnvelopePolicy {
        &self.policy
    }

    /// Whether a backend is registered for `kind`
    pub fn supports(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    fn backend(&self, kind: BackendKind) -> Result<&Arc<dyn KeyBackend>> {
        self.backends
            .get(&kind)
            .ok_or_else(|| Error::UnsupportedBackend(format!("no {} backend registered", kind)))
    }

    /// Mints or restores according to the request.
    ///
    /// Either a complete key comes back or an error does; there is no partial result.
    pub async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionedKey> {
        let backend = self.backend(request.backend)?;
        if request.wrapped_key.as_deref() == Some("") {
            return Err(Error::CorruptEnvelope("wrapped key is empty".into()));
        }

        let deadline = request.timeout.unwrap_or(self.policy.kms_timeout);
        let shared_key = request.shared_key.as_ref();
        let start = Instant::now();

        let result = match &request.wrapped_key {
            Some(wrapped_key) => {
                counter!("msgenvelope.provision.restore", 1);
                let handle = EnvelopeHandle::new(request.backend, &request.key_uri, wrapped_key);
                log::debug!("restoring {} key under {:?}", request.backend, request.key_uri);
                tokio::time::timeout(deadline, backend.restore(&handle, shared_key)).await
            }
            None => {
                counter!("msgenvelope.provision.mint", 1);
                log::debug!("minting {} key under {:?}", request.backend, request.key_uri);
                tokio::time::timeout(deadline, backend.mint(&request.key_uri, shared_key)).await
            }
        };

        histogram!("msgenvelope.provision.time", start.elapsed());

        match result {
            Ok(provisioned) => provisioned,
            Err(_) => {
                log::warn!(
                    "{} provisioning under {:?} timed out after {:?}",
                    request.backend,
                    request.key_uri,
                    deadline
                );
                Err(Error::BackendUnavailable(format!(
                    "key management call timed out after {:?}",
                    deadline
                )))
            }
        }
    }

    /// Restores the key described by `handle`
    pub async fn restore(
        &self,
        handle: &EnvelopeHandle,
        shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey> {
        let mut request = ProvisionRequest::restore(handle);
        if let Some(key) = shared_key {
            request = request.with_shared_key(key.clone());
        }
        self.provision(request).await
    }

    /// Mints a new key for `backend` under `key_uri`
    pub async fn mint(
        &self,
        backend: BackendKind,
        key_uri: &str,
        shared_key: Option<&SecretKey>,
    ) -> Result<ProvisionedKey> {
        let mut request = ProvisionRequest::mint(backend, key_uri);
        if let Some(key) = shared_key {
            request = request.with_shared_key(key.clone());
        }
        self.provision(request).await
    }
}

/// Builder for [`KeyProvisioner`]
#[derive(Debug, Default)]
pub struct KeyProvisionerBuilder {
    backends: HashMap<BackendKind, Arc<dyn KeyBackend>>,
    policy: Option<EnvelopePolicy>,
}

impl KeyProvisionerBuilder {
    /// Registers all three backends, the KMS-backed ones over `kms`
    pub fn with_kms(self, kms: Arc<dyn KeyManagementService>) -> Self {
        self.with_backend(Arc::new(WrappedEnvelopeBackend::new(kms.clone())))
            .with_backend(Arc::new(ServiceWrappedBackend::new(kms)))
            .with_backend(Arc::new(SharedSecretBackend::new()))
    }

    /// Registers one backend, replacing any previous backend of the same kind
    pub fn with_backend(mut self, backend: Arc<dyn KeyBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    /// Sets the policy; defaults apply otherwise
    pub fn with_policy(mut self, policy: EnvelopePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Builds the provisioner. At least one backend must be registered.
    pub fn build(self) -> Result<KeyProvisioner> {
        if self.backends.is_empty() {
            return Err(Error::InvalidArgument(
                "provisioner needs at least one backend".into(),
            ));
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> KeyProvisioner {
        KeyProvisioner {
            backends: self.backends,
            policy: self.policy.unwrap_or_default(),
        }
    }
}
