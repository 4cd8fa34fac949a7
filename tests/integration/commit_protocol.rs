//! Commit construction and application scenarios.

use super::support::*;
use sealfs::error::VfsError;
use sealfs::store::Storage;
use sealfs::vfs::Vfs;
use std::sync::Arc;

#[test]
fn test_first_commit_populates_the_tree() {
    let (vfs, store) = new_mem_vfs();
    let src = source_v1();

    let commit = make_test_commit(&vfs, src.path());
    assert_eq!(commit.ver(), 1);
    assert!(commit.headers.len() > 1);
    // root, /A/, /A/x, /B/, /B/1, /B/2/, /B/2/y, /readme.txt
    assert_eq!(commit.headers.len(), 8);

    vfs.apply_commit(commit).unwrap();

    let root = vfs.root_header();
    assert_eq!(root.ver(), 1);
    assert!(root.verify());
    assert!(!root.tree_merkle_root().is_empty());

    let readme = vfs.file_header("/readme.txt").unwrap();
    assert_eq!(readme.ver(), 1);
    assert_eq!(readme.file_size(), 13);
    assert_eq!(readme.file_merkle().len(), 32);

    // blobs landed under their paths
    assert!(store.open("/readme.txt").unwrap().is_some());
    assert!(store.open("/A/x").unwrap().is_some());

    // a reopened replica sees the same state
    let reopened = Vfs::open(test_pub(), store as Arc<dyn Storage>).unwrap();
    assert_eq!(reopened.headers(), vfs.headers());
}

#[test]
fn test_reapplying_the_same_commit_is_rejected() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();

    // both built against the same base state, so they are identical
    let first = BufferedCommit::make(&vfs, src.path());
    let second = first.to_commit();

    vfs.apply_commit(first.to_commit()).unwrap();
    let err = vfs.apply_commit(second).unwrap_err();
    assert!(matches!(err, VfsError::CommitRejected(_)), "{}", err);
}

#[test]
fn test_identical_content_with_fresh_timestamp_is_root_only() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    let commit = make_test_commit(&vfs, src.path());
    assert_eq!(commit.headers.len(), 1, "only the root header is re-emitted");
    assert_eq!(commit.ver(), 2);
    assert_eq!(commit.body_size(), 0);

    vfs.apply_commit(commit).unwrap();
    assert_eq!(vfs.root_header().ver(), 2);

    // unchanged files keep their original version
    assert_eq!(vfs.file_header("/readme.txt").unwrap().ver(), 1);
}

#[test]
fn test_removing_a_subtree_tombstones_it_and_drops_blobs() {
    let (vfs, store) = new_mem_vfs();
    let v1 = source_v1();
    let v2 = source_v2();
    apply_sources(&vfs, &[&v1, &v2]);

    assert!(store.open("/B/1").unwrap().is_some());
    assert!(store.open("/B/2/y").unwrap().is_some());

    let v3 = source_v3();
    let commit = make_test_commit(&vfs, v3.path());
    let tombstones: Vec<&str> = commit
        .headers
        .iter()
        .filter(|h| h.deleted())
        .map(|h| h.path())
        .collect();
    assert_eq!(tombstones, vec!["/B/"], "one tombstone for the subtree root");

    vfs.apply_commit(commit).unwrap();

    let b = vfs.file_header("/B/").unwrap();
    assert!(b.deleted());
    assert!(matches!(
        vfs.file_header("/B/2/"),
        Err(VfsError::NotFound)
    ));
    assert!(matches!(vfs.file_header("/B/1"), Err(VfsError::NotFound)));

    // every blob under the subtree is gone from the store
    assert!(store.open("/B/1").unwrap().is_none());
    assert!(store.open("/B/2/y").unwrap().is_none());
    assert!(store.open("/readme.txt").unwrap().is_some());
}

#[test]
fn test_tombstoned_path_cannot_be_resurrected() {
    let (vfs, _) = new_mem_vfs();
    let v1 = source_v1();
    let v3 = source_v3();
    apply_sources(&vfs, &[&v1, &v3]);

    // /B/ is tombstoned; a source that brings it back cannot be committed
    assert!(vfs.make_commit(
        &test_prv(),
        Arc::new(sealfs::source::DirSource::new(source_v1().path())),
        vfs.root_header().updated().unwrap() + chrono::Duration::seconds(1),
    )
    .is_err());
}

#[test]
fn test_empty_files_commit_without_merkle() {
    let (vfs, store) = new_mem_vfs();
    let src = write_tree(&[("empty.txt", ""), ("full.txt", "data")]);

    let commit = make_test_commit(&vfs, src.path());
    vfs.apply_commit(commit).unwrap();

    let empty = vfs.file_header("/empty.txt").unwrap();
    assert_eq!(empty.file_size(), 0);
    assert!(empty.file_merkle().is_empty());
    assert!(vfs.file_parts("/empty.txt").unwrap().is_empty());
    assert!(store.open("/empty.txt").unwrap().is_none());

    let full = vfs.file_header("/full.txt").unwrap();
    assert_eq!(full.file_size(), 4);
    assert_eq!(full.file_merkle().len(), 32);
}

#[test]
fn test_commit_skips_invalid_source_names() {
    let (vfs, _) = new_mem_vfs();
    let src = write_tree(&[("ok.txt", "fine"), (".hidden", "skipped")]);

    let commit = make_test_commit(&vfs, src.path());
    vfs.apply_commit(commit).unwrap();

    assert!(vfs.file_header("/ok.txt").is_ok());
    assert!(vfs.file_header("/.hidden").is_err());
}

#[test]
fn test_read_dir_lists_children_in_order() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    let root_entries: Vec<String> = vfs
        .read_dir("/")
        .unwrap()
        .iter()
        .map(|h| h.path().to_string())
        .collect();
    assert_eq!(root_entries, vec!["/A/", "/B/", "/readme.txt"]);

    let b_entries: Vec<String> = vfs
        .read_dir("/B/")
        .unwrap()
        .iter()
        .map(|h| h.path().to_string())
        .collect();
    assert_eq!(b_entries, vec!["/B/1", "/B/2/"]);

    assert!(vfs.read_dir("/readme.txt").is_err());
    assert!(vfs.read_dir("/missing/").is_err());
}

#[test]
fn test_open_file_reads_committed_content() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    let mut content = String::new();
    use std::io::Read;
    vfs.open_file("/readme.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "hello, world\n");
}
