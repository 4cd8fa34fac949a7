//! Membership witnesses and part hashes over committed state.

use super::support::*;
use sealfs::crypto::merkle::{merkle_root, verify_merkle_proof};
use sealfs::error::VfsError;

#[test]
fn test_every_header_has_a_verifying_witness() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    let root = vfs.root_header();
    let tree_root = root.tree_merkle_root();

    for h in vfs.headers().iter().skip(1) {
        let (hash, witness) = vfs.file_merkle_proof(h.path()).unwrap();

        assert_eq!(hash, h.hash(), "{}", h.path());
        assert!(!witness.is_empty() && witness.len() % 33 == 0, "{}", h.path());
        assert!(
            verify_merkle_proof(&hash, tree_root, &witness),
            "{}",
            h.path()
        );
    }
}

#[test]
fn test_witnesses_survive_later_commits() {
    let (vfs, _) = new_mem_vfs();
    let v1 = source_v1();
    let v2 = source_v2();
    apply_sources(&vfs, &[&v1, &v2]);

    let tree_root = vfs.root_header().tree_merkle_root().to_vec();
    for h in vfs.headers().iter().skip(1) {
        let (hash, witness) = vfs.file_merkle_proof(h.path()).unwrap();
        assert!(verify_merkle_proof(&hash, &tree_root, &witness), "{}", h.path());
    }
}

#[test]
fn test_witness_for_missing_or_root_path_fails() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    assert!(matches!(
        vfs.file_merkle_proof("/nope"),
        Err(VfsError::NotFound)
    ));
    assert!(matches!(
        vfs.file_merkle_proof("/"),
        Err(VfsError::NotFound)
    ));
}

#[test]
fn test_file_parts_recompose_the_header_merkle() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    for h in vfs.headers() {
        if h.is_dir() || h.deleted() || h.file_size() == 0 {
            continue;
        }
        let parts = vfs.file_parts(h.path()).unwrap();
        let expected = (h.file_size() + 1023) / 1024;
        assert_eq!(parts.len() as i64, expected, "{}", h.path());
        assert_eq!(
            merkle_root(&parts).unwrap().as_slice(),
            h.file_merkle(),
            "{}",
            h.path()
        );
    }
}

#[test]
fn test_multi_part_file_has_expected_part_count() {
    let (vfs, _) = new_mem_vfs();
    let src = source_v1();
    apply_sources(&vfs, &[&src]);

    // /A/x is 3000 bytes with a 1024-byte part size
    let parts = vfs.file_parts("/A/x").unwrap();
    assert_eq!(parts.len(), 3);

    let h = vfs.file_header("/A/x").unwrap();
    assert_eq!(h.file_size(), 3000);
}
