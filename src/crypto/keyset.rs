//! Serializable AES-GCM keyset and the AEAD built from it.
//!
//! The wrapped-envelope backend never ships a bare DEK. It ships an *encrypted keyset*:
//! the JSON-serialized [`Keyset`] encrypted by the key-management service, next to a
//! cleartext [`KeysetInfo`] describing which keys it holds. Ciphertexts produced by
//! [`KeysetAead`] carry a five byte prefix naming the key that sealed them.

use crate::crypto::aead::{fill_random, GCM_NONCE_SIZE};
use crate::crypto::gcm::GcmCipher;
use crate::error::{Error, Result};
use crate::{Aead, AES256_KEY_SIZE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Type URL recorded for every AES-GCM key in a keyset
pub const AES_GCM_TYPE_URL: &str = "type.googleapis.com/google.crypto.tink.AesGcmKey";

const STATUS_ENABLED: &str = "ENABLED";
const OUTPUT_PREFIX_TINK: &str = "TINK";
const KEY_MATERIAL_SYMMETRIC: &str = "SYMMETRIC";

const PREFIX_START_BYTE: u8 = 0x01;
/// Size of the key-id prefix on keyset ciphertexts
pub const PREFIX_SIZE: usize = 5;

/// Key material of a single keyset entry
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyData {
    pub type_url: String,
    /// Base64 of the raw key bytes
    pub value: String,
    pub key_material_type: String,
}

impl Drop for KeyData {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// One key in a keyset
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetKey {
    pub key_data: KeyData,
    pub status: String,
    pub key_id: u32,
    pub output_prefix_type: String,
}

/// Plaintext keyset. Only ever held in memory or encrypted by a KMS.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyset {
    pub primary_key_id: u32,
    pub key: Vec<KeysetKey>,
}

impl fmt::Debug for Keyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyset")
            .field("primary_key_id", &self.primary_key_id)
            .field("keys", &self.key.len())
            .finish()
    }
}

/// Cleartext description of one key, safe to transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub type_url: String,
    pub status: String,
    pub key_id: u32,
    pub output_prefix_type: String,
}

/// Cleartext description of a keyset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetInfo {
    pub primary_key_id: u32,
    pub key_info: Vec<KeyInfo>,
}

/// A keyset encrypted under a KEK, in its transportable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedKeyset {
    /// Base64 of the KMS ciphertext of the serialized [`Keyset`]
    pub encrypted_keyset: String,
    pub keyset_info: KeysetInfo,
}

impl EncryptedKeyset {
    /// Serializes to the JSON string stored as the envelope's wrapped key
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::CorruptEnvelope(format!("could not write encrypted keyset: {}", e)))
    }

    /// Parses the JSON string stored as the envelope's wrapped key
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| Error::CorruptEnvelope(format!("could not read encrypted keyset: {}", e)))
    }

    /// Decodes the KMS ciphertext
    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.encrypted_keyset)
            .map_err(|e| Error::CorruptEnvelope(format!("encrypted keyset is not base64: {}", e)))
    }
}

impl Keyset {
    /// Generates a keyset holding one fresh AES-256-GCM key
    pub fn generate() -> Self {
        let key_id = OsRng.next_u32();
        let mut raw = Zeroizing::new([0_u8; AES256_KEY_SIZE]);
        fill_random(&mut raw[..]);

        Self {
            primary_key_id: key_id,
            key: vec![KeysetKey {
                key_data: KeyData {
                    type_url: AES_GCM_TYPE_URL.to_string(),
                    value: STANDARD.encode(&raw[..]),
                    key_material_type: KEY_MATERIAL_SYMMETRIC.to_string(),
                },
                status: STATUS_ENABLED.to_string(),
                key_id,
                output_prefix_type: OUTPUT_PREFIX_TINK.to_string(),
            }],
        }
    }

    /// Cleartext description of this keyset
    pub fn info(&self) -> KeysetInfo {
        KeysetInfo {
            primary_key_id: self.primary_key_id,
            key_info: self
                .key
                .iter()
                .map(|k| KeyInfo {
                    type_url: k.key_data.type_url.clone(),
                    status: k.status.clone(),
                    key_id: k.key_id,
                    output_prefix_type: k.output_prefix_type.clone(),
                })
                .collect(),
        }
    }

    /// Serialized form handed to the KMS for encryption
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| Error::Crypto(format!("could not serialize keyset: {}", e)))
    }

    /// Parses a keyset recovered from the KMS
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::CorruptEnvelope(format!("could not parse keyset: {}", e)))
    }
}

/// AEAD over every enabled key of a keyset.
///
/// Seals with the primary key; opens with whichever key the ciphertext prefix names.
pub struct KeysetAead {
    primary_key_id: u32,
    ciphers: Vec<(u32, GcmCipher)>,
}

impl fmt::Debug for KeysetAead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeysetAead")
            .field("primary_key_id", &self.primary_key_id)
            .field("keys", &self.ciphers.len())
            .finish()
    }
}

impl KeysetAead {
    /// Builds the AEAD, rejecting keysets whose primary key is missing or unusable
    pub fn new(keyset: &Keyset) -> Result<Self> {
        let mut ciphers = Vec::with_capacity(keyset.key.len());

        for key in keyset.key.iter().filter(|k| k.status == STATUS_ENABLED) {
            if key.key_data.type_url != AES_GCM_TYPE_URL {
                return Err(Error::CorruptEnvelope(format!(
                    "unsupported key type {}",
                    key.key_data.type_url
                )));
            }

            let raw = Zeroizing::new(STANDARD.decode(&key.key_data.value).map_err(|e| {
                Error::CorruptEnvelope(format!("key {} is not base64: {}", key.key_id, e))
            })?);

            ciphers.push((key.key_id, GcmCipher::new(&raw)?));
        }

        if !ciphers.iter().any(|(id, _)| *id == keyset.primary_key_id) {
            return Err(Error::CorruptEnvelope(format!(
                "primary key {} is not an enabled key of the keyset",
                keyset.primary_key_id
            )));
        }

        Ok(Self {
            primary_key_id: keyset.primary_key_id,
            ciphers,
        })
    }

    /// Id of the key used for sealing
    pub fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    fn cipher(&self, key_id: u32) -> Option<&GcmCipher> {
        self.ciphers
            .iter()
            .find(|(id, _)| *id == key_id)
            .map(|(_, cipher)| cipher)
    }
}

impl Aead for KeysetAead {
    fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let cipher = self
            .cipher(self.primary_key_id)
            .ok_or_else(|| Error::Crypto("primary key missing from keyset".into()))?;

        let mut nonce = [0_u8; GCM_NONCE_SIZE];
        fill_random(&mut nonce);
        let sealed = cipher.encrypt_with_nonce(&nonce, plaintext, associated_data)?;

        let mut out = Vec::with_capacity(PREFIX_SIZE + GCM_NONCE_SIZE + sealed.len());
        out.push(PREFIX_START_BYTE);
        out.extend_from_slice(&self.primary_key_id.to_be_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < PREFIX_SIZE + GCM_NONCE_SIZE {
            return Err(Error::MalformedCiphertext(format!(
                "ciphertext is {} bytes, shorter than prefix and nonce",
                ciphertext.len()
            )));
        }

        let (prefix, rest) = ciphertext.split_at(PREFIX_SIZE);
        if prefix[0] != PREFIX_START_BYTE {
            return Err(Error::AuthenticationFailure);
        }

        let key_id = u32::from_be_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]);
        let cipher = self.cipher(key_id).ok_or(Error::AuthenticationFailure)?;

        let (nonce, sealed) = rest.split_at(GCM_NONCE_SIZE);
        cipher.decrypt_with_nonce(nonce, sealed, associated_data)
    }
}
