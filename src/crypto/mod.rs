//! Hashing, signing, and Merkle-tree primitives.

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{sha256, Hash, HASH_SIZE};
pub use keys::{PrivateKey, PublicKey, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use merkle::{
    make_merkle_proof, merkle_root, proof_append, verify_merkle_proof, MerkleHasher, OP_LHASH,
    OP_RHASH,
};
