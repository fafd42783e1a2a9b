use crate::crypto::aead::{fill_random, GCM_MAX_DATA_SIZE, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{Error, Result};
use crate::Aead;
use aes_gcm::{
    aead::{Aead as AeadTrait, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use std::fmt;

enum GcmKey {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM cipher bound to a single resolved key.
///
/// Sealed output is `nonce || ciphertext || tag` with a fresh random nonce per call.
/// Random 96-bit nonces carry the usual birthday bound: roughly 2^32 seals under one
/// key before the collision probability stops being negligible. Nothing here tracks
/// nonce reuse.
pub struct GcmCipher {
    key: GcmKey,
}

impl fmt::Debug for GcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcmCipher")
            .field("key_size", &self.key_size())
            .finish()
    }
}

impl GcmCipher {
    /// Builds a cipher from raw key bytes. AES-128 (16 bytes) and AES-256 (32 bytes) are accepted.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key = match key.len() {
            16 => GcmKey::Aes128(
                Aes128Gcm::new_from_slice(key).map_err(|e| Error::InvalidKey(e.to_string()))?,
            ),
            32 => GcmKey::Aes256(
                Aes256Gcm::new_from_slice(key).map_err(|e| Error::InvalidKey(e.to_string()))?,
            ),
            n => {
                return Err(Error::InvalidKey(format!(
                    "AES-GCM key must be 16 or 32 bytes, got {}",
                    n
                )))
            }
        };

        Ok(Self { key })
    }

    /// Size of the underlying key in bytes
    pub fn key_size(&self) -> usize {
        match self.key {
            GcmKey::Aes128(_) => 16,
            GcmKey::Aes256(_) => 32,
        }
    }

    /// Size of the nonce this cipher requires
    pub fn nonce_size(&self) -> usize {
        GCM_NONCE_SIZE
    }

    /// Encrypts under an explicit nonce, returning `ciphertext || tag`
    pub(crate) fn encrypt_with_nonce(
        &self,
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        if plaintext.len() > GCM_MAX_DATA_SIZE {
            return Err(Error::Crypto("Data too large for GCM".into()));
        }

        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };

        let sealed = match &self.key {
            GcmKey::Aes128(cipher) => cipher.encrypt(nonce, payload),
            GcmKey::Aes256(cipher) => cipher.encrypt(nonce, payload),
        };

        sealed.map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
    }

    /// Decrypts `ciphertext || tag` under an explicit nonce
    pub(crate) fn decrypt_with_nonce(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        let opened = match &self.key {
            GcmKey::Aes128(cipher) => cipher.decrypt(nonce, payload),
            GcmKey::Aes256(cipher) => cipher.decrypt(nonce, payload),
        };

        opened.map_err(|_| Error::AuthenticationFailure)
    }
}

impl Aead for GcmCipher {
    fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0_u8; GCM_NONCE_SIZE];
        fill_random(&mut nonce);

        let sealed = self.encrypt_with_nonce(&nonce, plaintext, associated_data)?;

        let mut out = Vec::with_capacity(GCM_NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < GCM_NONCE_SIZE {
            return Err(Error::MalformedCiphertext(format!(
                "ciphertext is {} bytes, shorter than the {}-byte nonce",
                ciphertext.len(),
                GCM_NONCE_SIZE
            )));
        }

        let (nonce, rest) = ciphertext.split_at(GCM_NONCE_SIZE);
        self.decrypt_with_nonce(nonce, rest, associated_data)
    }
}

/// Minimum length of a sealed payload (nonce and tag, empty plaintext)
pub const MIN_SEALED_SIZE: usize = GCM_NONCE_SIZE + GCM_TAG_SIZE;
