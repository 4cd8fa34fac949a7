//! Persistent storage backend over sled.

use crate::error::VfsError;
use crate::store::{Blob, StagedOp, StagedTx, Storage, Transaction};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;

fn sled_err(e: sled::Error) -> VfsError {
    VfsError::Storage(e.to_string())
}

/// Sled-backed blob store. Staged transaction operations are applied as a
/// single `sled::Batch`, so a crash never exposes a partial commit.
pub struct SledStore {
    db: sled::Db,
    write_lock: Mutex<()>,
}

impl SledStore {
    /// Open (or create) a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VfsError> {
        let db = sled::open(path).map_err(sled_err)?;
        Ok(SledStore {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Wrap an existing sled database handle.
    pub fn from_db(db: sled::Db) -> Self {
        SledStore {
            db,
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot of all keys, unordered. Non-UTF-8 keys are skipped.
    pub fn keys(&self) -> Result<Vec<String>, VfsError> {
        let mut out = Vec::new();
        for item in self.db.iter() {
            let (key, _) = item.map_err(sled_err)?;
            if let Ok(key) = std::str::from_utf8(&key) {
                out.push(key.to_string());
            }
        }
        Ok(out)
    }
}

impl Storage for SledStore {
    fn open(&self, key: &str) -> Result<Option<Box<dyn Blob>>, VfsError> {
        Ok(self
            .db
            .get(key)
            .map_err(sled_err)?
            .map(|value| Box::new(Cursor::new(value.to_vec())) as Box<dyn Blob>))
    }

    fn execute(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), VfsError>,
    ) -> Result<(), VfsError> {
        let _guard = self.write_lock.lock();
        let mut tx = StagedTx::new();
        f(&mut tx)?;

        let mut batch = sled::Batch::default();
        for op in tx.ops {
            match op {
                StagedOp::Put(key, data) => batch.insert(key.as_bytes(), data),
                StagedOp::Delete(key) => batch.remove(key.as_bytes()),
            }
        }
        self.db.apply_batch(batch).map_err(sled_err)?;
        self.db.flush().map_err(sled_err)?;
        Ok(())
    }
}
