use super::support::{station, store, StationStore};
use nasr_cache::{CacheLink, CacheStore, SharedStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn shared(dir: &std::path::Path, capacity: usize) -> SharedStore<u32, super::support::Station, super::support::StationCodec> {
    let store: StationStore = store(dir, capacity);
    let shared = store.into_shared();
    shared.lock().initialize(false).unwrap();
    shared
}

#[test]
fn link_loads_its_target_on_demand() {
    let tmp = tempfile::tempdir().unwrap();
    let stations = shared(tmp.path(), 1);
    stations.lock().add(1, station("north")).unwrap();
    stations.lock().add(2, station("south")).unwrap();

    let north = CacheStore::link(&stations, 1);
    assert_eq!(north.key(), &1);
    assert!(!stations.lock().contains(&1));

    assert_eq!(north.get().unwrap().name, "north");
    assert!(stations.lock().contains(&1));
    assert!(!stations.lock().contains(&2));
}

#[test]
fn link_never_holds_a_stale_instance() {
    let tmp = tempfile::tempdir().unwrap();
    let stations = shared(tmp.path(), 2);
    stations.lock().add(1, station("before")).unwrap();

    let link = CacheLink::new(&stations, 1);
    let first = link.get().unwrap();
    stations.lock().add(1, station("after")).unwrap();

    assert_eq!(first.name, "before");
    assert_eq!(link.get().unwrap().name, "after");
}

#[test]
fn value_outlives_its_eviction() {
    let tmp = tempfile::tempdir().unwrap();
    let stations = shared(tmp.path(), 1);
    stations.lock().add(1, station("held")).unwrap();

    let held = CacheLink::new(&stations, 1).get().unwrap();
    stations.lock().add(2, station("pusher")).unwrap();

    assert!(!stations.lock().contains(&1));
    assert_eq!(held.name, "held");
    assert_eq!(Arc::strong_count(&held), 1);
}

#[test]
fn links_are_usable_across_threads() {
    let tmp = tempfile::tempdir().unwrap();
    let stations = shared(tmp.path(), 2);
    for key in 0..8 {
        stations.lock().add(key, station(&format!("t{key}"))).unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|key| {
            let link = CacheLink::new(&stations, key);
            std::thread::spawn(move || link.get().unwrap().name.clone())
        })
        .collect();

    let names: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(names, (0..8).map(|key| format!("t{key}")).collect::<Vec<_>>());
    assert!(stations.lock().len() <= 2);
}
