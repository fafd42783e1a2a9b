//! The envelope handle: the serializable part of a provisioned key
//!
//! An [`EnvelopeHandle`] names the KEK, carries the backend-specific wrapped DEK and the
//! backend tag. It travels as a single string attribute next to the sealed payload and
//! never holds live key material.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TAG_WRAPPED_ENVELOPE: i64 = 0;
const TAG_RESERVED: i64 = 1;
const TAG_SHARED_SECRET: i64 = 2;
const TAG_SERVICE_WRAPPED_DIRECT: i64 = 3;

/// Key backend strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// A KMS encrypts a locally generated keyset; the encrypted keyset is the wrapped key
    WrappedEnvelope,
    /// A KMS encrypts the raw DEK directly; the base64 ciphertext is the wrapped key
    ServiceWrappedDirect,
    /// A pre-shared key; only its fingerprint is ever exposed
    SharedSecret,
}

impl BackendKind {
    /// Numeric tag used in the serialized handle
    pub fn tag(self) -> i64 {
        match self {
            BackendKind::WrappedEnvelope => TAG_WRAPPED_ENVELOPE,
            BackendKind::SharedSecret => TAG_SHARED_SECRET,
            BackendKind::ServiceWrappedDirect => TAG_SERVICE_WRAPPED_DIRECT,
        }
    }

    /// Resolves a numeric tag, rejecting reserved and unknown values
    pub fn from_tag(tag: i64) -> Result<Self> {
        match tag {
            TAG_WRAPPED_ENVELOPE => Ok(BackendKind::WrappedEnvelope),
            TAG_SHARED_SECRET => Ok(BackendKind::SharedSecret),
            TAG_SERVICE_WRAPPED_DIRECT => Ok(BackendKind::ServiceWrappedDirect),
            TAG_RESERVED => Err(Error::UnsupportedBackend(format!(
                "backend tag {} is reserved",
                tag
            ))),
            other => Err(Error::UnsupportedBackend(format!(
                "unknown backend tag {}",
                other
            ))),
        }
    }

    /// Whether provisioning this backend calls a key-management service
    pub fn uses_kms(self) -> bool {
        !matches!(self, BackendKind::SharedSecret)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::WrappedEnvelope => write!(f, "wrapped-envelope"),
            BackendKind::ServiceWrappedDirect => write!(f, "service-wrapped-direct"),
            BackendKind::SharedSecret => write!(f, "shared-secret"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    /// Accepts the display names as well as the short names `TINK`, `KMS` and `SHARED`
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wrapped-envelope" | "tink" => Ok(BackendKind::WrappedEnvelope),
            "service-wrapped-direct" | "kms" => Ok(BackendKind::ServiceWrappedDirect),
            "shared-secret" | "shared" => Ok(BackendKind::SharedSecret),
            other => Err(Error::UnsupportedBackend(format!(
                "unknown backend name {}",
                other
            ))),
        }
    }
}

/// On-the-wire shape of a handle
#[derive(Serialize, Deserialize)]
struct WireHandle {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    key_uri: String,
    #[serde(default)]
    dek: String,
    #[serde(rename = "type", default)]
    kind: i64,
}

/// Serializable envelope metadata. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHandle {
    key_uri: String,
    wrapped_key: String,
    backend: BackendKind,
}

impl EnvelopeHandle {
    /// Creates a handle from its three parts
    pub fn new(
        backend: BackendKind,
        key_uri: impl Into<String>,
        wrapped_key: impl Into<String>,
    ) -> Self {
        Self {
            key_uri: key_uri.into(),
            wrapped_key: wrapped_key.into(),
            backend,
        }
    }

    /// Identifier of the KEK; empty for shared-secret handles
    pub fn key_uri(&self) -> &str {
        &self.key_uri
    }

    /// Backend-specific wrapped DEK, or the key fingerprint for shared-secret handles
    pub fn wrapped_key(&self) -> &str {
        &self.wrapped_key
    }

    /// Backend that produced this handle
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Key under which a provisioned context for this handle is cached
    pub fn cache_key(&self) -> &str {
        &self.wrapped_key
    }

    /// Serializes to the `{"key_uri", "dek", "type"}` JSON attribute value
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&WireHandle::from(self))
            .map_err(|e| Error::CorruptEnvelope(format!("could not serialize handle: {}", e)))
    }

    /// Parses the JSON attribute value.
    ///
    /// Malformed JSON is `CorruptEnvelope`; a reserved or unknown `type` is `UnsupportedBackend`.
    pub fn from_json(s: &str) -> Result<Self> {
        let wire: WireHandle = serde_json::from_str(s)
            .map_err(|e| Error::CorruptEnvelope(format!("could not parse handle: {}", e)))?;
        Self::try_from(wire)
    }
}

impl From<&EnvelopeHandle> for WireHandle {
    fn from(handle: &EnvelopeHandle) -> Self {
        Self {
            key_uri: handle.key_uri.clone(),
            dek: handle.wrapped_key.clone(),
            kind: handle.backend.tag(),
        }
    }
}

impl TryFrom<WireHandle> for EnvelopeHandle {
    type Error = Error;

    fn try_from(wire: WireHandle) -> Result<Self> {
        Ok(Self {
            backend: BackendKind::from_tag(wire.kind)?,
            key_uri: wire.key_uri,
            wrapped_key: wire.dek,
        })
    }
}

impl Serialize for EnvelopeHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireHandle::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EnvelopeHandle {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireHandle::deserialize(deserializer)?;
        Self::try_from(wire).map_err(serde::de::Error::custom)
    }
}
