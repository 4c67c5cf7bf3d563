use super::support::{entry_file, station, store};
use nasr_cache::{now_utc, CacheError, CacheMetadata, StoreState};
use pretty_assertions::assert_eq;
use std::fs;
use time::Duration;

#[test]
fn fresh_directory_is_ready_for_a_rebuild() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = store(tmp.path(), 2);

    assert!(!store.initialize(true).unwrap());
    assert_eq!(store.state(), StoreState::Rebuilding);

    store.add(1, station("first")).unwrap();
    assert_eq!(store.get(&1).unwrap().name, "first");
}

#[test]
fn persisted_cache_is_reused_with_its_index() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut store = store(tmp.path(), 2);
        store.initialize(true).unwrap();
        for (key, name) in [(10, "Aurora"), (20, "Boulder"), (30, "Canon City")] {
            store.add(key, station(name)).unwrap();
        }
        store.uninitialize().unwrap();
        assert_eq!(store.state(), StoreState::Uninitialized);
    }

    let mut store = store(tmp.path(), 2);
    assert!(store.initialize(true).unwrap());
    assert_eq!(store.state(), StoreState::Valid);
    assert_eq!(store.len(), 0, "nothing is materialized by initialize");
    assert_eq!(store.index_len(), 3);
    assert_eq!(store.codec().restored, 3);
    assert_eq!(store.codec().by_name.get("Canon City"), Some(&30));
    assert_eq!(*store.get(&20).unwrap(), station("Boulder"));
}

#[test]
fn version_mismatch_discards_the_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("v");
    {
        let mut store = store(&dir, 2);
        store.initialize(true).unwrap();
        store.add(1, station("one")).unwrap();
        store.uninitialize().unwrap();
    }
    assert!(entry_file(&dir, 1).is_file());

    let mut store = store(&dir, 2).with_version(2);
    assert!(!store.initialize(true).unwrap());
    assert_eq!(store.state(), StoreState::Rebuilding);
    assert_eq!(store.index_len(), 0);
    assert!(!entry_file(&dir, 1).exists());
    assert!(!CacheMetadata::path(&dir).exists());
}

#[test]
fn expired_cache_is_discarded() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut store = store(tmp.path(), 2).with_invalidate_after(now_utc() - Duration::hours(1));
        store.initialize(true).unwrap();
        store.add(1, station("stale")).unwrap();
        store.uninitialize().unwrap();
    }

    let mut store = store(tmp.path(), 2);
    assert!(!store.initialize(true).unwrap());
    assert!(!entry_file(tmp.path(), 1).exists());
}

#[test]
fn invalidate_after_is_restored_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let expiry = time::macros::datetime!(2999-01-01 00:00:00 UTC);
    {
        let mut store = store(tmp.path(), 2).with_invalidate_after(expiry);
        store.initialize(true).unwrap();
        store.uninitialize().unwrap();
    }

    let mut store = store(tmp.path(), 2);
    assert!(store.initialize(true).unwrap());
    assert_eq!(store.invalidate_after(), expiry);
}

#[test]
fn declining_the_existing_cache_wipes_it() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut store = store(tmp.path(), 2);
        store.initialize(true).unwrap();
        store.add(1, station("one")).unwrap();
        store.uninitialize().unwrap();
    }

    let mut store = store(tmp.path(), 2);
    assert!(!store.initialize(false).unwrap());
    assert!(!entry_file(tmp.path(), 1).exists());
    assert!(store.codec().by_name.is_empty());
}

#[test]
fn second_uninitialize_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = store(tmp.path(), 2);
    store.initialize(true).unwrap();
    store.add(1, station("one")).unwrap();
    store.uninitialize().unwrap();

    let metadata = CacheMetadata::path(tmp.path());
    assert!(metadata.is_file());
    fs::remove_file(&metadata).unwrap();

    store.uninitialize().unwrap();
    assert!(!metadata.exists());
}

#[test]
fn unchanged_cache_is_not_rewritten() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut store = store(tmp.path(), 2);
        store.initialize(true).unwrap();
        store.add(1, station("one")).unwrap();
        store.uninitialize().unwrap();
    }

    let mut store = store(tmp.path(), 2);
    assert!(store.initialize(true).unwrap());
    store.get(&1).unwrap();
    assert!(!store.is_dirty());

    let metadata = CacheMetadata::path(tmp.path());
    fs::remove_file(&metadata).unwrap();
    store.uninitialize().unwrap();
    assert!(!metadata.exists());
}

#[test]
fn empty_rebuild_still_writes_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = store(tmp.path(), 2);
    assert!(!store.initialize(true).unwrap());
    store.uninitialize().unwrap();

    let metadata = CacheMetadata::load(tmp.path()).unwrap().unwrap();
    assert_eq!(metadata.header.version, 1);
    assert!(metadata.index.is_empty());
}

#[test]
fn corrupt_index_line_fails_to_load() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        CacheMetadata::path(tmp.path()),
        "CacheVersion:1\nInvalidateAfter:9999-12-31T23:59:59Z\n2=10Aurora\nnot-an-index-line\n",
    )
    .unwrap();

    let mut store = store(tmp.path(), 2);
    assert!(matches!(
        store.initialize(true),
        Err(CacheError::MetadataLoadFailure { .. })
    ));
    assert_eq!(store.state(), StoreState::Uninitialized);
    assert_eq!(store.index_len(), 0);
}

#[test]
fn undecodable_key_fails_to_load() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        CacheMetadata::path(tmp.path()),
        "CacheVersion:1\nInvalidateAfter:9999-12-31T23:59:59Z\n3=abcName\n",
    )
    .unwrap();

    let mut store = store(tmp.path(), 2);
    match store.initialize(true).unwrap_err() {
        CacheError::MetadataLoadFailure { source, .. } => {
            assert!(matches!(*source, CacheError::InvalidKey { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.codec().by_name.is_empty());
}

#[test]
fn garbage_header_means_rebuild() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(CacheMetadata::path(tmp.path()), "not a cache\n").unwrap();
    fs::write(entry_file(tmp.path(), 5), "name=left over\n").unwrap();

    let mut store = store(tmp.path(), 2);
    assert!(!store.initialize(true).unwrap());
    assert!(!entry_file(tmp.path(), 5).exists());
}
