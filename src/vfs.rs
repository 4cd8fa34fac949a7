//! The virtual file system: snapshot reads, commit construction,
//! validation, and atomic application.
//!
//! The in-memory tree sits behind a reader/writer lock. Reads hold the
//! shared lock for the whole call and hand out deep copies;
//! `apply_commit` holds the exclusive lock across validation and the
//! storage transaction, so a failed commit leaves no trace.

use crate::commit::{BodyReader, Commit};
use crate::crypto::hash::{Hash, HASH_SIZE};
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::crypto::merkle::MerkleHasher;
use crate::error::VfsError;
use crate::header::{
    Header, sort_headers, CREATED, DELETED, MERKLE, PATH, PROTOCOL_VERSION, SIZE,
    TREE_MERKLE_ROOT, TREE_VOLUME, UPDATED, VER,
};
use crate::path::{is_valid_path, is_valid_path_name, path_cmp, MAX_DIR_FILES_COUNT};
use crate::source::SourceTree;
use crate::store::{get_json, put_json, Blob, Storage, HEADERS_KEY};
use crate::tree::Tree;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// A replica of one publisher's signed file system.
pub struct Vfs {
    public_key: PublicKey,
    store: Arc<dyn Storage>,
    state: RwLock<Tree>,
}

fn reject(reason: impl Into<String>) -> VfsError {
    let reason = reason.into();
    debug!(%reason, "commit rejected");
    VfsError::CommitRejected(reason)
}

impl Vfs {
    /// Open a VFS over a byte store. An empty store starts at the
    /// unsigned sentinel root with `Ver = 0`.
    pub fn open(public_key: PublicKey, store: Arc<dyn Storage>) -> Result<Vfs, VfsError> {
        let headers: Vec<Header> =
            get_json(store.as_ref(), HEADERS_KEY)?.unwrap_or_default();
        let headers = if headers.is_empty() {
            vec![Header::new_root(&public_key)]
        } else {
            headers
        };
        let state = Tree::from_headers(headers)?;
        Ok(Vfs {
            public_key,
            store,
            state: RwLock::new(state),
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Copy of the current root header.
    pub fn root_header(&self) -> Header {
        self.state.read().root().clone()
    }

    /// Copy of the header at `path`.
    pub fn file_header(&self, path: &str) -> Result<Header, VfsError> {
        self.state
            .read()
            .get(path)
            .cloned()
            .ok_or(VfsError::NotFound)
    }

    /// Child headers of a live directory.
    pub fn read_dir(&self, path: &str) -> Result<Vec<Header>, VfsError> {
        self.state
            .read()
            .child_headers(path)
            .ok_or(VfsError::NotFound)
    }

    /// Copy of every header, in canonical path order.
    pub fn headers(&self) -> Vec<Header> {
        self.state.read().headers()
    }

    /// Open a file's content blob.
    pub fn open_file(&self, path: &str) -> Result<Box<dyn Blob>, VfsError> {
        self.store.open(path)?.ok_or(VfsError::NotFound)
    }

    /// Membership proof for a non-root path: the path's header hash plus
    /// the witness verifying it against the root's `Tree-Merkle-Root`.
    pub fn file_merkle_proof(&self, path: &str) -> Result<(Hash, Vec<u8>), VfsError> {
        let state = self.state.read();
        let witness = state.merkle_witness(path).ok_or(VfsError::NotFound)?;
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&witness[..HASH_SIZE]);
        Ok((hash, witness[HASH_SIZE..].to_vec()))
    }

    /// Part hashes of a file's content; their Merkle root equals the
    /// header's `Merkle` field.
    pub fn file_parts(&self, path: &str) -> Result<Vec<Hash>, VfsError> {
        let (size, part_size) = {
            let state = self.state.read();
            let h = state.get(path).ok_or(VfsError::NotFound)?;
            (h.file_size(), effective_part_size(h, state.root()))
        };
        if size <= 0 {
            return Ok(Vec::new());
        }
        let mut blob = self.open_file(path)?;
        let mut hasher = MerkleHasher::new(part_size);
        io::copy(&mut blob.as_mut().take(size as u64), &mut hasher)?;
        if hasher.written() != size {
            return Err(VfsError::Storage(format!(
                "blob {} is shorter than its header Size",
                path
            )));
        }
        Ok(hasher.leaves())
    }

    /// Emit a commit containing every header newer than `ver`, with file
    /// bodies opened lazily from the store. `None` if the replica has
    /// nothing newer.
    pub fn get_commit(&self, ver: i64) -> Result<Option<Commit>, VfsError> {
        let state = self.state.read();
        if state.root().ver() <= ver {
            return Ok(None);
        }

        let mut headers = Vec::new();
        let mut body = BodyReader::new();
        state.walk(&mut |h| {
            if h.ver() > ver {
                headers.push(h.clone());
                if h.is_file() && !h.deleted() && h.file_size() > 0 {
                    let store = Arc::clone(&self.store);
                    let path = h.path().to_string();
                    let size = h.file_size() as u64;
                    body.push(Box::new(move || {
                        let blob = store.open(&path)?.ok_or(VfsError::NotFound)?;
                        Ok(Box::new(blob.take(size)) as Box<dyn Read + Send>)
                    }));
                }
            }
            true
        });

        debug!(
            since = ver,
            to = state.root().ver(),
            headers = headers.len(),
            "assembled commit"
        );
        Ok(Some(Commit {
            headers,
            body: Box::new(body),
        }))
    }

    /// Build a signed commit by diffing the source tree against the
    /// current state. Headers are emitted for the root, for new paths,
    /// and for files whose part-Merkle changed; paths gone from the
    /// source become tombstones.
    pub fn make_commit(
        &self,
        prv: &PrivateKey,
        src: Arc<dyn SourceTree>,
        ts: DateTime<Utc>,
    ) -> Result<Commit, VfsError> {
        let state = self.state.read();
        let mut walk = SourceWalk {
            ver: state.root().ver() + 1,
            part_size: state.root().part_size(),
            headers: Vec::new(),
            merged: Vec::new(),
            body: BodyReader::new(),
            on_disk: HashSet::new(),
            emitted: HashSet::new(),
        };
        walk.visit(&state, &src, "/")?;

        // tombstone everything the source no longer has; unchanged
        // headers still flow into the recomputed tree
        state.walk(&mut |h| {
            if !walk.on_disk.contains(h.path()) {
                let mut tomb = Header::new();
                tomb.add(PATH, h.path());
                tomb.set_int(VER, walk.ver);
                tomb.set_int(DELETED, 1);
                walk.headers.push(tomb.clone());
                walk.merged.push(tomb);
                return false;
            }
            if !walk.emitted.contains(h.path()) {
                walk.merged.push(h.clone());
            }
            true
        });

        sort_headers(&mut walk.headers);
        let tree = Tree::from_headers(walk.merged)?;

        let root = &mut walk.headers[0];
        if !root.has(CREATED) {
            root.set_time(CREATED, ts);
        }
        root.set_time(UPDATED, ts);
        root.set_int(TREE_VOLUME, tree.total_volume());
        root.set_bytes(TREE_MERKLE_ROOT, tree.tree_merkle_root());
        root.sign(prv);

        info!(
            ver = walk.ver,
            headers = walk.headers.len(),
            "built commit"
        );
        Ok(Commit {
            headers: walk.headers,
            body: Box::new(walk.body),
        })
    }

    /// Validate and atomically apply a commit. Either the tree and the
    /// store both advance, or neither does.
    pub fn apply_commit(&self, commit: Commit) -> Result<(), VfsError> {
        let mut state = self.state.write();
        let Commit {
            mut headers,
            mut body,
        } = commit;

        if headers.is_empty() {
            return Err(reject("empty commit"));
        }
        sort_headers(&mut headers);

        //--- verify the root header ---
        let r = state.root().clone();
        let b = headers[0].clone();

        if b.path() != "/" {
            return Err(reject("missing root header"));
        }
        b.validate()?;
        if b.protocol() != PROTOCOL_VERSION {
            return Err(reject("unsupported protocol"));
        }
        if b.ver() <= 0 {
            return Err(reject("invalid root Ver"));
        }
        if b.part_size() != r.part_size() {
            return Err(reject("root Part-Size mismatch"));
        }
        let created = b.created().ok_or_else(|| reject("missing root Created"))?;
        if let Some(existing) = r.created() {
            if created.timestamp() != existing.timestamp() {
                return Err(reject("root Created differs from current state"));
            }
        }
        let updated = b.updated().ok_or_else(|| reject("missing root Updated"))?;
        if updated.timestamp() < created.timestamp() {
            return Err(reject("root Updated precedes Created"));
        }
        if b.deleted() {
            return Err(reject("root is marked deleted"));
        }
        if b.public_key().as_ref() != Some(&self.public_key) {
            return Err(reject("wrong publisher key"));
        }
        if !b.verify() {
            return Err(reject("invalid root signature"));
        }
        if !b.version_is_greater(&r) {
            return Err(reject("version is not greater"));
        }

        // a same-version commit supplants all content
        let mut pending_delete: BTreeSet<String> = BTreeSet::new();
        if b.ver() == r.ver() {
            state.walk(&mut |h| {
                if h.is_file() && !h.deleted() && h.file_size() > 0 {
                    pending_delete.insert(h.path().to_string());
                }
                true
            });
        }

        //--- verify the remaining headers ---
        for h in &headers[1..] {
            h.validate()?;
            if h.is_dir() || h.deleted() {
                if h.has(SIZE) || h.has(MERKLE) {
                    return Err(reject(format!(
                        "unexpected file fields on {}",
                        h.path()
                    )));
                }
            } else {
                let well_formed = (h.file_size() == 0 && !h.has(MERKLE))
                    || (h.file_size() > 0 && h.file_merkle().len() == HASH_SIZE);
                if !well_formed {
                    return Err(reject(format!("invalid Size/Merkle on {}", h.path())));
                }
            }
            if h.deleted() {
                state.walk_from(h.path(), &mut |sub| {
                    if sub.is_file() && !sub.deleted() && sub.file_size() > 0 {
                        pending_delete.insert(sub.path().to_string());
                    }
                    true
                });
            } else if state.get(h.path()).is_some_and(|old| old.deleted()) {
                return Err(reject(format!("cannot restore deleted {}", h.path())));
            }
        }

        //--- merge with the surviving current headers ---
        let updated_paths: HashMap<&str, &Header> =
            headers.iter().map(|h| (h.path(), h)).collect();
        let mut merged = headers.clone();
        state.walk(&mut |h| match updated_paths.get(h.path()) {
            None => {
                merged.push(h.clone());
                true
            }
            Some(u) => !u.deleted(),
        });

        let candidate = Tree::from_headers(merged)?;
        let merged_sorted = candidate.headers();

        if candidate.tree_merkle_root() != b.tree_merkle_root() {
            return Err(reject("Tree-Merkle-Root mismatch"));
        }
        if candidate.total_volume() != b.tree_volume() {
            return Err(reject("Tree-Volume mismatch"));
        }

        //--- verify and store file content, then the header list ---
        let root_part_size = b.part_size();
        self.store.execute(&mut |tx| {
            for h in &headers {
                let size = h.file_size();
                if size <= 0 {
                    continue;
                }
                let part_size = if h.part_size() > 0 {
                    h.part_size()
                } else {
                    root_part_size
                };
                if part_size <= 0 {
                    return Err(reject(format!("empty Part-Size for {}", h.path())));
                }

                let mut hasher = MerkleHasher::new(part_size);
                {
                    let mut tee = TeeReader {
                        inner: (&mut body).take(size as u64),
                        hasher: &mut hasher,
                    };
                    tx.put(h.path(), &mut tee)?;
                }
                if hasher.written() != size {
                    return Err(reject(format!("body is short for {}", h.path())));
                }
                let computed = hasher.root().map(|x| x.to_vec()).unwrap_or_default();
                if computed != h.file_merkle() {
                    return Err(reject(format!("file Merkle mismatch for {}", h.path())));
                }
                pending_delete.remove(h.path());
            }

            for key in &pending_delete {
                tx.delete(key)?;
            }
            put_json(tx, HEADERS_KEY, &merged_sorted)
        })?;

        info!(
            ver = b.ver(),
            headers = headers.len(),
            deleted_blobs = pending_delete.len(),
            "applied commit"
        );
        *state = candidate;
        Ok(())
    }
}

/// Effective part size for a file header: its own `Part-Size`, else the
/// root's, else the protocol default.
fn effective_part_size(h: &Header, root: &Header) -> i64 {
    if h.part_size() > 0 {
        h.part_size()
    } else if root.part_size() > 0 {
        root.part_size()
    } else {
        crate::header::DEFAULT_PART_SIZE
    }
}

/// State of one source-tree walk during commit construction.
struct SourceWalk {
    ver: i64,
    part_size: i64,
    headers: Vec<Header>,
    merged: Vec<Header>,
    body: BodyReader,
    on_disk: HashSet<String>,
    emitted: HashSet<String>,
}

impl SourceWalk {
    fn visit(
        &mut self,
        state: &Tree,
        src: &Arc<dyn SourceTree>,
        path: &str,
    ) -> Result<(), VfsError> {
        if !is_valid_path(path) {
            return Ok(());
        }
        let rel = &path[1..];
        let is_dir = path.ends_with('/');
        let existing = state.get(path).cloned();
        self.on_disk.insert(path.to_string());

        let mut h = existing.clone().unwrap_or_else(|| {
            let mut h = Header::new();
            h.add(PATH, path);
            h
        });

        let mut file_size = 0;
        let mut file_merkle = Vec::new();
        if !is_dir {
            let mut hasher = MerkleHasher::new(self.part_size);
            io::copy(&mut src.open(rel)?, &mut hasher)?;
            file_size = hasher.written();
            file_merkle = hasher.root().map(|x| x.to_vec()).unwrap_or_default();
        }

        let changed = path == "/"
            || existing.is_none()
            || (!is_dir && h.file_merkle() != file_merkle.as_slice());
        if changed {
            h.set_int(VER, self.ver);
            if !is_dir {
                h.set_int(SIZE, file_size);
                if file_merkle.is_empty() {
                    h.delete(MERKLE);
                } else {
                    h.set_bytes(MERKLE, file_merkle);
                }
                if file_size > 0 {
                    let src = Arc::clone(src);
                    let rel = rel.to_string();
                    self.body.push(Box::new(move || src.open(&rel)));
                }
            }
            self.emitted.insert(path.to_string());
            self.headers.push(h.clone());
            self.merged.push(h);
        }

        if is_dir {
            let rel_dir = rel.strip_suffix('/').unwrap_or(rel);
            let mut entries = src.read_dir(rel_dir)?;
            if entries.len() > MAX_DIR_FILES_COUNT {
                return Err(VfsError::TooManyFiles);
            }
            entries.sort_by(|a, b| path_cmp(&a.name, &b.name));
            for entry in entries {
                if !is_valid_path_name(&entry.name) {
                    continue;
                }
                let child = if entry.is_dir {
                    format!("{}{}/", path, entry.name)
                } else {
                    format!("{}{}", path, entry.name)
                };
                self.visit(state, src, &child)?;
            }
        }
        Ok(())
    }
}

/// Forwards reads while feeding every byte into a Merkle hasher.
struct TeeReader<'a, R: Read> {
    inner: R,
    hasher: &'a mut MerkleHasher,
}

impl<R: Read> Read for TeeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.write_all(&buf[..n])?;
        Ok(n)
    }
}
