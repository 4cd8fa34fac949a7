//! Replica convergence through `get_commit`.

use super::support::*;

#[test]
fn test_get_commit_returns_nothing_when_up_to_date() {
    let (vfs, _) = new_mem_vfs();
    assert!(vfs.get_commit(0).unwrap().is_none());

    let src = source_v1();
    apply_sources(&vfs, &[&src]);
    assert!(vfs.get_commit(1).unwrap().is_none());
    assert!(vfs.get_commit(7).unwrap().is_none());
    assert!(vfs.get_commit(0).unwrap().is_some());
}

#[test]
fn test_full_sync_from_version_zero() {
    let v1 = source_v1();
    let v2 = source_v2();
    let v3 = source_v3();

    let (publisher, publisher_store) = new_mem_vfs();
    apply_sources(&publisher, &[&v1, &v2, &v3]);
    assert_eq!(publisher.root_header().ver(), 3);

    let (replica, replica_store) = new_mem_vfs();
    let commit = publisher.get_commit(0).unwrap().unwrap();
    assert_eq!(commit.ver(), 3);
    assert!(commit.headers.len() > 1);

    replica.apply_commit(commit).unwrap();

    assert_eq!(replica.headers(), publisher.headers());
    assert_eq!(
        store_snapshot(&replica_store),
        store_snapshot(&publisher_store),
        "blobs and persisted header list are byte-identical"
    );
}

#[test]
fn test_incremental_sync_from_watermark() {
    let v1 = source_v1();
    let v2 = source_v2();
    let v3 = source_v3();

    let (publisher, publisher_store) = new_mem_vfs();
    apply_sources(&publisher, &[&v1, &v2, &v3]);

    // replica already has the first revision
    let (replica, replica_store) = new_mem_vfs();
    apply_sources(&replica, &[&v1]);
    let watermark = replica.root_header().ver();
    assert_eq!(watermark, 1);

    let commit = publisher.get_commit(watermark).unwrap().unwrap();
    assert_eq!(commit.ver(), 3);

    replica.apply_commit(commit).unwrap();

    assert_eq!(replica.headers(), publisher.headers());
    assert_eq!(
        store_snapshot(&replica_store),
        store_snapshot(&publisher_store)
    );
}

#[test]
fn test_incremental_commit_omits_older_headers() {
    let v1 = source_v1();
    let v2 = source_v2();

    let (publisher, _) = new_mem_vfs();
    apply_sources(&publisher, &[&v1, &v2]);

    let commit = publisher.get_commit(1).unwrap().unwrap();
    let paths: Vec<&str> = commit.headers.iter().map(|h| h.path()).collect();

    // only the paths the second revision touched
    assert!(paths.contains(&"/"));
    assert!(paths.contains(&"/readme.txt"));
    assert!(paths.contains(&"/C/new.txt"));
    assert!(!paths.contains(&"/A/x"), "unchanged file is not re-sent");
    assert!(!paths.contains(&"/B/1"));
}
