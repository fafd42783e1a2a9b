//! Cryptographic primitives used by the key backends
//!
//! - [`GcmCipher`]: AES-GCM bound to a resolved key, emitting `nonce || ciphertext || tag`
//! - [`keyset`]: a serializable keyset and the [`KeysetAead`] built from it, used by the
//!   wrapped-envelope backend

mod aead;
pub mod gcm;
pub mod keyset;

pub use aead::{fill_random, random_bytes, GCM_NONCE_SIZE, GCM_TAG_SIZE};
pub use gcm::GcmCipher;
pub use keyset::{EncryptedKeyset, Keyset, KeysetAead};
