//! Every tampered commit must be rejected, leaving state untouched.

use super::support::*;
use sealfs::error::VfsError;
use sealfs::header::{Header, MERKLE, SIZE, UPDATED};

/// Fresh VFS at v2 plus a buffered valid commit moving it to v3.
fn staged_commit() -> (sealfs::vfs::Vfs, std::sync::Arc<sealfs::store::MemoryStore>, BufferedCommit)
{
    let (vfs, store) = new_mem_vfs();
    let v1 = source_v1();
    let v2 = source_v2();
    apply_sources(&vfs, &[&v1, &v2]);
    let commit = BufferedCommit::make(&vfs, source_v3().path());
    (vfs, store, commit)
}

fn last_file_header(headers: &mut [Header]) -> &mut Header {
    headers
        .iter_mut()
        .rev()
        .find(|h| h.is_file() && !h.deleted() && h.file_size() > 0)
        .unwrap()
}

#[test]
fn test_valid_commit_is_accepted() {
    let (vfs, _, commit) = staged_commit();
    vfs.apply_commit(commit.to_commit()).unwrap();
    assert_eq!(vfs.root_header().ver(), 3);
}

#[test]
fn test_mutated_root_field_breaks_the_signature() {
    let (vfs, store, mut commit) = staged_commit();
    let before = store_snapshot(&store);

    commit.headers[0].set(UPDATED, "2022-01-03T00:00:01Z");
    let err = vfs.apply_commit(commit.to_commit()).unwrap_err();

    assert!(matches!(err, VfsError::CommitRejected(_)), "{}", err);
    assert_eq!(store_snapshot(&store), before, "no partial state");
    assert_eq!(vfs.root_header().ver(), 2);
}

#[test]
fn test_bumped_file_size_is_rejected() {
    let (vfs, _, mut commit) = staged_commit();

    let h = last_file_header(&mut commit.headers);
    let size = h.file_size();
    h.set_int(SIZE, size + 1);

    assert!(vfs.apply_commit(commit.to_commit()).is_err());
}

#[test]
fn test_extended_file_merkle_is_rejected() {
    let (vfs, _, mut commit) = staged_commit();

    let h = last_file_header(&mut commit.headers);
    let mut merkle = h.file_merkle().to_vec();
    merkle.push(0);
    h.set_bytes(MERKLE, merkle);

    assert!(vfs.apply_commit(commit.to_commit()).is_err());
}

#[test]
fn test_flipped_body_byte_is_rejected() {
    let (vfs, store, mut commit) = staged_commit();
    let before = store_snapshot(&store);

    let last = commit.body.len() - 1;
    commit.body[last] = commit.body[last].wrapping_add(1);

    let err = vfs.apply_commit(commit.to_commit()).unwrap_err();
    assert!(matches!(err, VfsError::CommitRejected(_)), "{}", err);
    // the body is verified inside the transaction; nothing leaked out
    assert_eq!(store_snapshot(&store), before);
    assert_eq!(vfs.root_header().ver(), 2);
}

#[test]
fn test_dropped_header_is_rejected() {
    let (vfs, _, mut commit) = staged_commit();
    commit.headers.pop();
    assert!(vfs.apply_commit(commit.to_commit()).is_err());
}

#[test]
fn test_truncated_body_is_rejected() {
    let (vfs, _, mut commit) = staged_commit();
    commit.body.pop();
    assert!(vfs.apply_commit(commit.to_commit()).is_err());
}

#[test]
fn test_wrong_publisher_key_is_rejected() {
    let (vfs, _, mut commit) = staged_commit();

    // re-sign the root with a different key: internally consistent, but
    // not this publisher
    let stranger = sealfs::crypto::keys::PrivateKey::from_seed("stranger");
    commit.headers[0].sign(&stranger);
    assert!(commit.headers[0].verify());

    let err = vfs.apply_commit(commit.to_commit()).unwrap_err();
    assert!(matches!(err, VfsError::CommitRejected(_)), "{}", err);
}

#[test]
fn test_equal_version_conflict_resolves_by_hash() {
    // two forks of the same base with the same Ver and Updated, one
    // distinguished by an extra root field
    let (fork_a, _) = new_mem_vfs();
    let (fork_b, _) = new_mem_vfs();
    let src = source_v1();

    let commit_a = BufferedCommit::make(&fork_a, src.path());
    let mut commit_b = BufferedCommit::make(&fork_b, src.path());
    commit_b.headers[0].add("X", "x");
    commit_b.headers[0].sign(&test_prv());

    assert_eq!(commit_a.headers[0].ver(), commit_b.headers[0].ver());
    assert_eq!(
        commit_a.headers[0].updated(),
        commit_b.headers[0].updated()
    );

    let (lesser, greater) = if commit_a.headers[0].hash() < commit_b.headers[0].hash() {
        (commit_a, commit_b)
    } else {
        (commit_b, commit_a)
    };

    // lesser first, then the greater-hashed tie wins
    let (vfs, _) = new_mem_vfs();
    vfs.apply_commit(lesser.to_commit()).unwrap();
    vfs.apply_commit(greater.to_commit()).unwrap();

    // the reverse order is refused
    let err = vfs.apply_commit(lesser.to_commit()).unwrap_err();
    assert!(matches!(err, VfsError::CommitRejected(_)), "{}", err);

    // content survived the tie switch
    assert!(vfs.file_header("/readme.txt").is_ok());
    assert_eq!(vfs.file_parts("/readme.txt").unwrap().len(), 1);
}
