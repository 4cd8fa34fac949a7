//! Path-keyed header records.
//!
//! A header is an ordered list of `(name, value)` fields. Order and
//! duplicates are significant: the canonical hash and therefore the root
//! signature cover the fields exactly as they appear. `set` updates the
//! last occurrence, `add` always appends, `delete` removes every
//! occurrence.

use crate::crypto::hash::Hash;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::error::VfsError;
use crate::path;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64_RAW;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum encoded header length in bytes.
pub const MAX_HEADER_LENGTH: usize = 10 * 1024;

/// Protocol identifier carried by every root header.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Default file part size: 1 MiB.
pub const DEFAULT_PART_SIZE: i64 = 1 << 20;

// root header fields
pub const PROTOCOL: &str = "Protocol";
pub const PUBLIC_KEY: &str = "Public-Key";
pub const SIGNATURE: &str = "Signature";
pub const TREE_VOLUME: &str = "Tree-Volume";
pub const TREE_MERKLE_ROOT: &str = "Tree-Merkle-Root";
pub const PART_SIZE: &str = "Part-Size";

// general fields
pub const VER: &str = "Ver";
pub const PATH: &str = "Path";
pub const CREATED: &str = "Created";
pub const UPDATED: &str = "Updated";
pub const DELETED: &str = "Deleted";

// file fields
pub const SIZE: &str = "Size";
pub const MERKLE: &str = "Merkle";

const FIELD_NAME_CHARS: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-_.";

const BINARY_VALUE_PREFIX: &str = "base64,";

const TEXT_VALUE_CHARS: &[u8] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ,.:;_-+=?~!@#$%^&*()<>[]{}/| ";

/// One named field with an opaque byte value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: Vec<u8>,
}

/// Ordered field list describing a file, directory, or the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<HeaderField>,
}

impl Header {
    pub fn new() -> Self {
        Header::default()
    }

    /// Root header of a freshly created, still unsigned file system.
    /// `Ver = 0` is the sentinel for "no commit applied yet".
    pub fn new_root(pub_key: &PublicKey) -> Header {
        let mut h = Header::new();
        h.add(PROTOCOL, PROTOCOL_VERSION);
        h.add(PATH, "/");
        h.add_int(VER, 0);
        h.add_int(PART_SIZE, DEFAULT_PART_SIZE);
        h.set_public_key(pub_key);
        h
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of the last occurrence of `name`.
    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| f.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Value of the last occurrence as text; empty for a missing field or
    /// a non-UTF-8 value.
    pub fn get(&self, name: &str) -> &str {
        self.get_bytes(name)
            .and_then(|v| std::str::from_utf8(v).ok())
            .unwrap_or("")
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.index_of(name).map(|i| self.fields[i].value.as_slice())
    }

    /// Decimal integer value; `0` for a missing or malformed field.
    pub fn get_int(&self, name: &str) -> i64 {
        self.get(name).parse().unwrap_or(0)
    }

    /// RFC 3339 timestamp value; `None` for a missing or malformed field.
    pub fn get_time(&self, name: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.get(name))
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Replace the value of the last occurrence, or append.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_bytes(name, value.as_bytes().to_vec());
    }

    pub fn set_bytes(&mut self, name: &str, value: Vec<u8>) {
        match self.index_of(name) {
            Some(i) => self.fields[i].value = value,
            None => self.fields.push(HeaderField {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn set_int(&mut self, name: &str, value: i64) {
        self.set(name, &value.to_string());
    }

    pub fn set_time(&mut self, name: &str, value: DateTime<Utc>) {
        self.set(name, &format_time(value));
    }

    /// Append a field, keeping any previous occurrences.
    pub fn add(&mut self, name: &str, value: &str) {
        self.add_bytes(name, value.as_bytes().to_vec());
    }

    pub fn add_bytes(&mut self, name: &str, value: Vec<u8>) {
        self.fields.push(HeaderField {
            name: name.to_string(),
            value,
        });
    }

    pub fn add_int(&mut self, name: &str, value: i64) {
        self.add(name, &value.to_string());
    }

    pub fn add_time(&mut self, name: &str, value: DateTime<Utc>) {
        self.add(name, &format_time(value));
    }

    /// Remove every occurrence of `name`.
    pub fn delete(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    /// Canonical hash: SHA-256 over `BE32(len(name)) ‖ name ‖
    /// BE32(len(value)) ‖ value` for each field in order, excluding a
    /// trailing `Signature` field.
    pub fn hash(&self) -> Hash {
        let mut n = self.fields.len();
        if n > 0 && self.fields[n - 1].name == SIGNATURE {
            n -= 1;
        }
        let mut hasher = Sha256::new();
        for f in &self.fields[..n] {
            hasher.update((f.name.len() as u32).to_be_bytes());
            hasher.update(f.name.as_bytes());
            hasher.update((f.value.len() as u32).to_be_bytes());
            hasher.update(&f.value);
        }
        hasher.finalize().into()
    }

    /// Sum of field name and value lengths.
    pub fn length(&self) -> usize {
        self.fields.iter().map(|f| f.name.len() + f.value.len()).sum()
    }

    /// Header length plus file size; the node's contribution to the tree
    /// volume.
    pub fn total_volume(&self) -> i64 {
        self.length() as i64 + self.file_size()
    }

    /// Field name charset, total length, and path validity.
    pub fn validate(&self) -> Result<(), VfsError> {
        if self.length() > MAX_HEADER_LENGTH {
            return Err(VfsError::InvalidHeader("header is too long"));
        }
        for f in &self.fields {
            if f.name.is_empty() || !f.name.bytes().all(|c| FIELD_NAME_CHARS.contains(&c)) {
                return Err(VfsError::InvalidHeader("invalid field name"));
            }
        }
        if !path::is_valid_path(self.path()) {
            return Err(VfsError::InvalidPath(self.path().to_string()));
        }
        Ok(())
    }

    //--------------------------------------
    //        pre-defined fields
    //--------------------------------------

    pub fn path(&self) -> &str {
        self.get(PATH)
    }

    pub fn is_dir(&self) -> bool {
        self.path().ends_with('/')
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    pub fn deleted(&self) -> bool {
        self.has(DELETED)
    }

    pub fn ver(&self) -> i64 {
        self.get_int(VER)
    }

    pub fn part_size(&self) -> i64 {
        self.get_int(PART_SIZE)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.get_time(CREATED)
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.get_time(UPDATED)
    }

    pub fn file_size(&self) -> i64 {
        self.get_int(SIZE)
    }

    pub fn file_merkle(&self) -> &[u8] {
        self.get_bytes(MERKLE).unwrap_or(&[])
    }

    pub fn tree_merkle_root(&self) -> &[u8] {
        self.get_bytes(TREE_MERKLE_ROOT).unwrap_or(&[])
    }

    pub fn tree_volume(&self) -> i64 {
        self.get_int(TREE_VOLUME)
    }

    //--------- root-header crypto ----------

    pub fn protocol(&self) -> &str {
        self.get(PROTOCOL)
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        PublicKey::decode(self.get(PUBLIC_KEY))
    }

    pub fn set_public_key(&mut self, pub_key: &PublicKey) {
        self.set(PUBLIC_KEY, &pub_key.encode());
    }

    /// Sign the header: stamp the publisher key, strip any previous
    /// signature, then append `Signature` over the canonical hash so it
    /// ends up as the final field.
    pub fn sign(&mut self, prv: &PrivateKey) {
        self.set_public_key(&prv.public_key());
        self.delete(SIGNATURE);
        let signature = prv.sign(&self.hash());
        self.add_bytes(SIGNATURE, signature.to_vec());
    }

    /// Verify that the final field is a `Signature` over the canonical
    /// hash of the preceding fields, under the embedded `Public-Key`.
    pub fn verify(&self) -> bool {
        let n = self.fields.len();
        if n < 2 || self.fields[n - 1].name != SIGNATURE {
            return false;
        }
        match self.public_key() {
            Some(pub_key) => pub_key.verify(&self.hash(), &self.fields[n - 1].value),
            None => false,
        }
    }

    /// Version dominance: later version wins; equal versions fall back to
    /// the lexicographically greater canonical hash.
    pub fn version_is_greater(&self, other: &Header) -> bool {
        self.ver() > other.ver() || (self.ver() == other.ver() && self.hash() > other.hash())
    }
}

/// Sort headers into canonical path order.
pub fn sort_headers(headers: &mut [Header]) {
    headers.sort_by(|a, b| path::path_cmp(a.path(), b.path()));
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

//--------------------------------------
//        JSON encoding
//--------------------------------------
//
// A header renders as a flat JSON object in field order, one member per
// field, duplicates preserved. Values that fit the restricted text charset
// are emitted verbatim; anything else (or a value that itself starts with
// "base64,") becomes "base64,<standard-no-pad>". Neither names nor encoded
// values ever need JSON escaping, so the rendering is byte-stable.

fn encode_value(value: &[u8]) -> String {
    let is_text = value.iter().all(|c| TEXT_VALUE_CHARS.contains(c));
    if is_text && !value.starts_with(BINARY_VALUE_PREFIX.as_bytes()) {
        // charset is ASCII-only, so this cannot fail
        String::from_utf8(value.to_vec()).unwrap_or_default()
    } else {
        format!("{}{}", BINARY_VALUE_PREFIX, BASE64_RAW.encode(value))
    }
}

fn decode_value(value: &str) -> Result<Vec<u8>, String> {
    match value.strip_prefix(BINARY_VALUE_PREFIX) {
        Some(b64) => BASE64_RAW
            .decode(b64)
            .map_err(|e| format!("invalid base64 value: {}", e)),
        None => Ok(value.as_bytes().to_vec()),
    }
}

impl Serialize for Header {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for f in &self.fields {
            map.serialize_entry(&f.name, &encode_value(&f.value))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Header {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderVisitor;

        impl<'de> Visitor<'de> for HeaderVisitor {
            type Value = Header;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a header object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Header, A::Error> {
                let mut h = Header::new();
                while let Some((name, value)) = map.next_entry::<String, String>()? {
                    let value = decode_value(&value).map_err(serde::de::Error::custom)?;
                    h.add_bytes(&name, value);
                }
                Ok(h)
            }
        }

        deserializer.deserialize_map(HeaderVisitor)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Deserialization helper for the persisted header list: tolerates a
/// missing or empty document.
pub fn headers_from_json(data: &[u8]) -> Result<Vec<Header>, VfsError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(data)?)
}
