//! Source-tree adapter used when building a commit.
//!
//! Paths handed to the adapter are VFS paths with the leading slash
//! stripped: `""` is the source root, `"A/x"` a file below it.

use crate::error::VfsError;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

/// One directory entry of a source tree.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Read-only view of the tree being committed.
pub trait SourceTree: Send + Sync {
    /// Open a file for reading.
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, VfsError>;

    /// List a directory, unordered.
    fn read_dir(&self, path: &str) -> Result<Vec<SourceEntry>, VfsError>;
}

/// Source tree over a local directory.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirSource { root: root.into() }
    }
}

impl SourceTree for DirSource {
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, VfsError> {
        let file = fs::File::open(self.root.join(path))?;
        Ok(Box::new(file))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<SourceEntry>, VfsError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.root.join(path))? {
            let entry = entry?;
            entries.push(SourceEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }
}
