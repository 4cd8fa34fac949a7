//! In-memory storage backend.

use crate::error::VfsError;
use crate::store::{Blob, StagedOp, StagedTx, Storage, Transaction};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;

/// Heap-backed store for tests and ephemeral replicas.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of all keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl Storage for MemoryStore {
    fn open(&self, key: &str) -> Result<Option<Box<dyn Blob>>, VfsError> {
        Ok(self
            .entries
            .lock()
            .get(key)
            .map(|data| Box::new(Cursor::new(data.clone())) as Box<dyn Blob>))
    }

    fn execute(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), VfsError>,
    ) -> Result<(), VfsError> {
        let _guard = self.write_lock.lock();
        let mut tx = StagedTx::new();
        f(&mut tx)?;

        let mut entries = self.entries.lock();
        for op in tx.ops {
            match op {
                StagedOp::Put(key, data) => {
                    entries.insert(key, data);
                }
                StagedOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
