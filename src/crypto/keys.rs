//! Publisher key pair: Ed25519 signing over 32-byte hashes, with the
//! text encoding used inside root headers.

use crate::crypto::hash::{sha256, HASH_SIZE};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;

/// Size of a raw Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

const PUBLIC_KEY_PREFIX: &str = "Ed25519,";

/// Publisher signing key.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

/// Publisher verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PrivateKey {
    /// Derive a key pair from a seed phrase. The Ed25519 seed is the
    /// SHA-256 of the phrase, so any string yields a valid key.
    pub fn from_seed(seed: &str) -> Self {
        PrivateKey(SigningKey::from_bytes(&sha256(&[seed.as_bytes()])))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Sign a 32-byte hash. Ed25519 is deterministic: equal inputs yield
    /// equal signatures.
    pub fn sign(&self, hash: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.0.sign(hash).to_bytes()
    }
}

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Text encoding carried in the `Public-Key` header field.
    pub fn encode(&self) -> String {
        format!("{}{}", PUBLIC_KEY_PREFIX, BASE64.encode(self.as_bytes()))
    }

    /// Parse the text encoding; `None` for anything that is not a valid
    /// 32-byte Ed25519 key.
    pub fn decode(s: &str) -> Option<PublicKey> {
        let s = s.strip_prefix(PUBLIC_KEY_PREFIX).unwrap_or(s);
        let raw = BASE64.decode(s).ok()?;
        let raw: [u8; PUBLIC_KEY_SIZE] = raw.try_into().ok()?;
        VerifyingKey::from_bytes(&raw).ok().map(PublicKey)
    }

    /// Verify an Ed25519 signature over a 32-byte hash.
    pub fn verify(&self, hash: &[u8], signature: &[u8]) -> bool {
        if hash.len() != HASH_SIZE || signature.len() != SIGNATURE_SIZE {
            return false;
        }
        match Signature::from_slice(signature) {
            Ok(sig) => self.0.verify(hash, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.encode())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key().encode())
    }
}
