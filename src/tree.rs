//! Tree index over a flat header list.
//!
//! Nodes live in an arena; parents are resolved through a path map, and
//! children are kept in canonical path order so the per-directory Merkle
//! layout is deterministic. All algorithms run top-down from the root, so
//! no back-pointers are needed.

use crate::crypto::hash::{sha256, Hash, HASH_SIZE};
use crate::crypto::merkle::{make_merkle_proof, merkle_root, proof_append, OP_LHASH};
use crate::error::VfsError;
use crate::header::{sort_headers, Header};
use crate::path::dirname;
use std::collections::HashMap;

struct Node {
    header: Header,
    children: Vec<usize>,
}

/// Indexed file-system tree. Immutable once built; commits build a fresh
/// tree and swap it in.
pub struct Tree {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    root: usize,
}

impl Tree {
    /// Index a header list. The list is sorted internally, which also
    /// guarantees parents are linked before their children. Fails on a
    /// duplicate path, a missing or deleted parent, or a missing root.
    pub fn from_headers(mut headers: Vec<Header>) -> Result<Tree, VfsError> {
        sort_headers(&mut headers);

        let mut nodes: Vec<Node> = Vec::with_capacity(headers.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(headers.len());
        let mut root = None;

        for header in headers {
            let path = header.path().to_string();
            if index.contains_key(&path) {
                return Err(VfsError::DuplicatePath(path));
            }
            let idx = nodes.len();
            if path == "/" {
                root = Some(idx);
            } else {
                let parent = *index
                    .get(dirname(&path))
                    .ok_or_else(|| VfsError::ParentNotFound(path.clone()))?;
                if nodes[parent].header.deleted() {
                    return Err(VfsError::ParentDeleted(path.clone()));
                }
                nodes[parent].children.push(idx);
            }
            nodes.push(Node {
                header,
                children: Vec::new(),
            });
            index.insert(path, idx);
        }

        let root = root.ok_or(VfsError::InvalidHeader("missing root header"))?;
        Ok(Tree { nodes, index, root })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> &Header {
        &self.nodes[self.root].header
    }

    pub fn get(&self, path: &str) -> Option<&Header> {
        self.index.get(path).map(|&i| &self.nodes[i].header)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Child headers of a live directory, in canonical order.
    pub fn child_headers(&self, path: &str) -> Option<Vec<Header>> {
        let &idx = self.index.get(path)?;
        let node = &self.nodes[idx];
        if !node.header.is_dir() || node.header.deleted() {
            return None;
        }
        Some(
            node.children
                .iter()
                .map(|&c| self.nodes[c].header.clone())
                .collect(),
        )
    }

    /// Depth-first pre-order walk in canonical path order. Returning
    /// `false` from the visitor skips the node's subtree.
    pub fn walk<F: FnMut(&Header) -> bool>(&self, f: &mut F) {
        self.walk_node(self.root, f);
    }

    fn walk_node<F: FnMut(&Header) -> bool>(&self, idx: usize, f: &mut F) {
        if f(&self.nodes[idx].header) {
            for &child in &self.nodes[idx].children {
                self.walk_node(child, f);
            }
        }
    }

    /// Walk the subtree rooted at `path`, if present.
    pub fn walk_from<F: FnMut(&Header) -> bool>(&self, path: &str, f: &mut F) {
        if let Some(&idx) = self.index.get(path) {
            self.walk_node(idx, f);
        }
    }

    /// Snapshot of every header in canonical path order.
    pub fn headers(&self) -> Vec<Header> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(&mut |h| {
            out.push(h.clone());
            true
        });
        out
    }

    /// Node hash: the header hash for a leaf, otherwise the header hash
    /// combined with the children's Merkle root.
    fn node_hash(&self, idx: usize) -> Hash {
        match self.children_merkle_root(idx) {
            None => self.nodes[idx].header.hash(),
            Some(children_root) => sha256(&[&self.nodes[idx].header.hash(), &children_root]),
        }
    }

    fn children_merkle_root(&self, idx: usize) -> Option<Hash> {
        let hashes: Vec<Hash> = self.nodes[idx]
            .children
            .iter()
            .map(|&c| self.node_hash(c))
            .collect();
        merkle_root(&hashes)
    }

    /// Merkle root committed by the root header's `Tree-Merkle-Root`
    /// field. Covers the root's children only, so the root header itself
    /// can change between versions without perturbing it. Empty for a
    /// tree without children.
    pub fn tree_merkle_root(&self) -> Vec<u8> {
        self.children_merkle_root(self.root)
            .map(|h| h.to_vec())
            .unwrap_or_default()
    }

    /// Sum of `header length + file size` over every non-root node.
    pub fn total_volume(&self) -> i64 {
        self.nodes
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != self.root)
            .map(|(_, n)| n.header.total_volume())
            .sum()
    }

    /// Membership witness for a non-root path, verifiable against
    /// [`Self::tree_merkle_root`]. Layout: `header_hash ‖ (op, sibling)*`.
    pub fn merkle_witness(&self, path: &str) -> Option<Vec<u8>> {
        if path == "/" || !self.index.contains_key(path) {
            return None;
        }
        self.children_witness(self.root, path)
    }

    fn node_witness(&self, idx: usize, path: &str) -> Option<Vec<u8>> {
        let node = &self.nodes[idx];
        if node.header.path() == path {
            return Some(match self.children_merkle_root(idx) {
                None => node.header.hash().to_vec(),
                Some(children_root) => {
                    make_merkle_proof(&[node.header.hash(), children_root], 0)
                }
            });
        }
        let mut witness = self.children_witness(idx, path)?;
        proof_append(&mut witness, OP_LHASH, &node.header.hash());
        Some(witness)
    }

    fn children_witness(&self, idx: usize, path: &str) -> Option<Vec<u8>> {
        let children = &self.nodes[idx].children;
        let i = children.iter().position(|&c| self.covers(c, path))?;

        let mut witness = self.node_witness(children[i], path)?;
        let hashes: Vec<Hash> = children.iter().map(|&c| self.node_hash(c)).collect();
        witness.extend_from_slice(&make_merkle_proof(&hashes, i)[HASH_SIZE..]);
        Some(witness)
    }

    /// True if the node at `idx` is `path` itself or a directory above it.
    fn covers(&self, idx: usize, path: &str) -> bool {
        let p = self.nodes[idx].header.path();
        p == path || (p.ends_with('/') && path.starts_with(p))
    }
}
