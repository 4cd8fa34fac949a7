//! Transactional byte-blob storage consumed by the VFS.
//!
//! One entry per file path plus the header-list JSON under the reserved
//! key `"."`. `execute` is all-or-nothing: staged writes become visible
//! only when the closure returns success.

pub mod memory;
pub mod persistence;

pub use memory::MemoryStore;
pub use persistence::SledStore;

use crate::error::VfsError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Seek};

/// Reserved key holding the persisted header list.
pub const HEADERS_KEY: &str = ".";

/// Readable, seekable blob handle. Closing happens on drop.
pub trait Blob: Read + Seek + Send {}

impl<T: Read + Seek + Send> Blob for T {}

/// Write half of a storage transaction.
pub trait Transaction {
    /// Store the reader's remaining bytes under `key`, replacing any
    /// previous value.
    fn put(&mut self, key: &str, value: &mut dyn Read) -> Result<(), VfsError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&mut self, key: &str) -> Result<(), VfsError>;
}

/// Transactional byte store.
pub trait Storage: Send + Sync {
    /// Open the blob at `key`; `None` if absent.
    fn open(&self, key: &str) -> Result<Option<Box<dyn Blob>>, VfsError>;

    /// Run `f` against a transaction under the store's write mutex.
    /// Commits if `f` succeeds, discards every staged operation if it
    /// fails.
    fn execute(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), VfsError>,
    ) -> Result<(), VfsError>;
}

/// Read and decode a JSON value; `None` if the key is absent or empty.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn Storage,
    key: &str,
) -> Result<Option<T>, VfsError> {
    let mut blob = match store.open(key)? {
        Some(blob) => blob,
        None => return Ok(None),
    };
    let mut data = Vec::new();
    blob.read_to_end(&mut data)?;
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Encode a value as JSON and stage it under `key`.
pub fn put_json<T: Serialize + ?Sized>(
    tx: &mut dyn Transaction,
    key: &str,
    value: &T,
) -> Result<(), VfsError> {
    let data = serde_json::to_vec(value)?;
    tx.put(key, &mut data.as_slice())
}

/// Staged transaction operations shared by the in-tree backends.
pub(crate) enum StagedOp {
    Put(String, Vec<u8>),
    Delete(String),
}

pub(crate) struct StagedTx {
    pub ops: Vec<StagedOp>,
}

impl StagedTx {
    pub fn new() -> Self {
        StagedTx { ops: Vec::new() }
    }
}

impl Transaction for StagedTx {
    fn put(&mut self, key: &str, value: &mut dyn Read) -> Result<(), VfsError> {
        let mut data = Vec::new();
        value.read_to_end(&mut data)?;
        self.ops.push(StagedOp::Put(key.to_string(), data));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), VfsError> {
        self.ops.push(StagedOp::Delete(key.to_string()));
        Ok(())
    }
}
