//! SHA-256 checksum helpers.

use sha2::{Digest, Sha256};

/// Size of a hash checksum in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// SHA-256 checksum of the concatenated arguments.
pub fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
