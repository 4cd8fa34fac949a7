//! Path algebra: validation, ordering, and parent computation.
//!
//! A path is `"/"` or `/`-separated components with an optional trailing
//! slash marking a directory. Ordering compares component-wise, so a
//! directory sorts before everything inside it.

use std::cmp::Ordering;

/// Maximum total path length in bytes.
pub const MAX_PATH_LENGTH: usize = 255;
/// Maximum length of a single path component in bytes.
pub const MAX_PATH_NAME_LENGTH: usize = 50;
/// Maximum path depth.
pub const MAX_PATH_LEVELS: usize = 6;
/// Maximum number of entries in one directory.
pub const MAX_DIR_FILES_COUNT: usize = 1024;

const PATH_NAME_CHARS: &[u8] =
    b".-_~@0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Validate an absolute VFS path.
pub fn is_valid_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    if path.is_empty() || !path.starts_with('/') || path.len() > MAX_PATH_LENGTH {
        return false;
    }
    let trimmed = path[1..].strip_suffix('/').unwrap_or(&path[1..]);
    for (i, name) in trimmed.split('/').enumerate() {
        if i >= MAX_PATH_LEVELS || !is_valid_path_name(name) {
            return false;
        }
    }
    true
}

/// Validate a single path component.
pub fn is_valid_path_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name.len() <= MAX_PATH_NAME_LENGTH
        && name.bytes().all(|c| PATH_NAME_CHARS.contains(&c))
}

/// Component-wise path order. A path is a strict prefix of its own
/// extensions, so `/a/` sorts before `/a/b`.
pub fn path_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.split('/');
    let mut bi = b.split('/');
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// True if `a` sorts no later than `b`.
pub fn path_less(a: &str, b: &str) -> bool {
    path_cmp(a, b) != Ordering::Greater
}

/// Nearest ancestor directory, with trailing slash. The root has no
/// parent: `dirname("/") == ""`.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(i) => &path[..i + 1],
        None => "",
    }
}
