use rand::{rngs::OsRng, RngCore};

// Constants for GCM mode
const GCM_BLOCK_SIZE: usize = 16; // AES block size
/// Size of the random nonce prepended to every sealed payload
pub const GCM_NONCE_SIZE: usize = 12;
/// Size of the authentication tag appended by GCM
pub const GCM_TAG_SIZE: usize = 16;

// Maximum message size supported by GCM
// ((1 << 32) - 2) * GCM_BLOCK_SIZE
pub(crate) const GCM_MAX_DATA_SIZE: usize = ((1 << 32) - 2) * GCM_BLOCK_SIZE;

/// Fills a buffer with random bytes using a cryptographically secure RNG
pub fn fill_random(buffer: &mut [u8]) {
    OsRng.fill_bytes(buffer);
}

/// Returns `size` random bytes from the OS RNG
pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut buffer = vec![0_u8; size];
    fill_random(&mut buffer);
    buffer
}
