//! Commit: the unit of replication.
//!
//! `headers[0]` is the updated, signed root; the remaining headers cover
//! every path whose version changed. The body is the unframed
//! concatenation of file contents in header order; each header's `Size`
//! is authoritative for splitting it.

use crate::crypto::hash::Hash;
use crate::error::VfsError;
use crate::header::Header;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read};

/// Deferred open of one body segment.
pub type BodyOpener = Box<dyn FnOnce() -> Result<Box<dyn Read + Send>, VfsError> + Send>;

/// A header diff plus the matching body stream.
pub struct Commit {
    pub headers: Vec<Header>,
    pub body: Box<dyn Read + Send>,
}

impl Commit {
    /// The updated root header.
    pub fn root(&self) -> &Header {
        &self.headers[0]
    }

    pub fn ver(&self) -> i64 {
        self.root().ver()
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.root().updated()
    }

    pub fn hash(&self) -> Hash {
        self.root().hash()
    }

    /// Total body length implied by the headers.
    pub fn body_size(&self) -> i64 {
        self.headers.iter().map(|h| h.file_size()).sum()
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commit")
            .field("headers", &self.headers.len())
            .field("ver", &self.ver())
            .field("body_size", &self.body_size())
            .finish()
    }
}

/// Reader over a queue of lazily opened segments. Each file is opened on
/// first read and dropped once exhausted, so at most one segment handle
/// is live at a time.
pub struct BodyReader {
    queue: VecDeque<BodyOpener>,
    current: Option<Box<dyn Read + Send>>,
}

impl BodyReader {
    pub fn new() -> Self {
        BodyReader {
            queue: VecDeque::new(),
            current: None,
        }
    }

    pub fn push(&mut self, opener: BodyOpener) {
        self.queue.push_back(opener);
    }
}

impl Default for BodyReader {
    fn default() -> Self {
        BodyReader::new()
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                let n = reader.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }
            match self.queue.pop_front() {
                Some(opener) => {
                    let reader = opener().map_err(io::Error::other)?;
                    self.current = Some(reader);
                }
                None => return Ok(0),
            }
        }
    }
}
