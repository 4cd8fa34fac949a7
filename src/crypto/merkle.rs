//! Unbalanced binary Merkle tree over ordered 32-byte leaves.
//!
//! The root of `n` leaves splits at the largest power of two strictly
//! below `n`, producing a left-full tree. Proofs are byte strings of the
//! form `leaf ‖ (op, sibling)*` where the op byte says on which side the
//! sibling joins the accumulated hash.

use crate::crypto::hash::{sha256, Hash, HASH_SIZE};
use sha2::{Digest, Sha256};
use std::io::{self, Write};

/// Proof op: sibling hash joins on the left.
pub const OP_LHASH: u8 = 0;
/// Proof op: sibling hash joins on the right.
pub const OP_RHASH: u8 = 1;

/// Merkle root of an ordered leaf sequence. `None` for an empty sequence.
pub fn merkle_root(hashes: &[Hash]) -> Option<Hash> {
    match hashes.len() {
        0 => None,
        1 => Some(hashes[0]),
        n => {
            let m = merkle_middle(n);
            let left = merkle_root(&hashes[..m]).unwrap();
            let right = merkle_root(&hashes[m..]).unwrap();
            Some(sha256(&[&left, &right]))
        }
    }
}

/// Largest power of two strictly less than `n` (`n ≥ 2`).
fn merkle_middle(n: usize) -> usize {
    let mut i = 1;
    while (i << 1) < n {
        i <<= 1;
    }
    i
}

/// Membership proof for leaf `i`: the leaf hash followed by one
/// `(op, sibling)` step per tree level.
pub fn make_merkle_proof(hashes: &[Hash], i: usize) -> Vec<u8> {
    assert!(i < hashes.len(), "proof index out of range");
    if hashes.len() == 1 {
        return hashes[0].to_vec();
    }
    let m = merkle_middle(hashes.len());
    if i < m {
        let mut proof = make_merkle_proof(&hashes[..m], i);
        proof_append(&mut proof, OP_RHASH, &merkle_root(&hashes[m..]).unwrap());
        proof
    } else {
        let mut proof = make_merkle_proof(&hashes[m..], i - m);
        proof_append(&mut proof, OP_LHASH, &merkle_root(&hashes[..m]).unwrap());
        proof
    }
}

/// Append one `(op, sibling)` step to a proof.
pub fn proof_append(proof: &mut Vec<u8>, op: u8, hash: &Hash) {
    proof.push(op);
    proof.extend_from_slice(hash);
}

/// Recompute the root from `hash` and the proof steps and compare it with
/// `root`. An empty proof checks `hash` against `root` directly.
pub fn verify_merkle_proof(hash: &Hash, root: &[u8], proof: &[u8]) -> bool {
    const STEP: usize = HASH_SIZE + 1;
    let mut acc = *hash;
    let mut rest = proof;
    while !rest.is_empty() {
        if rest.len() < STEP {
            return false;
        }
        let sibling = &rest[1..STEP];
        acc = match rest[0] {
            OP_RHASH => sha256(&[&acc, sibling]),
            OP_LHASH => sha256(&[sibling, &acc]),
            _ => return false,
        };
        rest = &rest[STEP..];
    }
    acc == root
}

/// Streaming Merkle leaf builder shaped as a writer.
///
/// Bytes are split into fixed-size parts; each closed part emits one
/// SHA-256 leaf. A non-positive part size disables splitting, leaving a
/// single leaf equal to the plain SHA-256 of the stream.
pub struct MerkleHasher {
    part_size: i64,
    hasher: Sha256,
    part_fill: i64,
    written: i64,
    leaves: Vec<Hash>,
}

impl MerkleHasher {
    pub fn new(part_size: i64) -> Self {
        MerkleHasher {
            part_size,
            hasher: Sha256::new(),
            part_fill: 0,
            written: 0,
            leaves: Vec::new(),
        }
    }

    /// Total bytes written so far.
    pub fn written(&self) -> i64 {
        self.written
    }

    /// Closed leaves plus the trailing partial leaf, if any bytes are
    /// buffered. Does not disturb the running state.
    pub fn leaves(&self) -> Vec<Hash> {
        let mut leaves = self.leaves.clone();
        if self.part_fill > 0 {
            leaves.push(self.hasher.clone().finalize().into());
        }
        leaves
    }

    /// Merkle root over [`Self::leaves`]. `None` if nothing was written.
    pub fn root(&self) -> Option<Hash> {
        merkle_root(&self.leaves())
    }
}

impl Write for MerkleHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let take = if self.part_size > 0 {
                ((self.part_size - self.part_fill) as usize).min(rest.len())
            } else {
                rest.len()
            };
            self.hasher.update(&rest[..take]);
            self.part_fill += take as i64;
            self.written += take as i64;
            rest = &rest[take..];
            if self.part_size > 0 && self.part_fill == self.part_size {
                self.leaves.push(self.hasher.finalize_reset().into());
                self.part_fill = 0;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
