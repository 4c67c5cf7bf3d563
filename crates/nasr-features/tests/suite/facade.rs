use crate::suite::support::{airport, runway, seed, settings};
use nasr_cache::{now_utc, StoreState};
use nasr_features::{FacilityCaches, FeatureError};
use pretty_assertions::assert_eq;
use uuid::Uuid;

#[test]
fn fresh_root_is_built_then_reused() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path(), 10, 10);

    let caches = FacilityCaches::new(&settings);
    assert!(caches.initialize(true).unwrap());
    seed(&caches);
    caches.unload().unwrap();
    assert!(settings.airport_dir().join(".cache").is_file());
    assert!(settings.runway_dir().join(".cache").is_file());

    let reopened = FacilityCaches::new(&settings);
    assert!(!reopened.initialize(true).unwrap());
    assert_eq!(reopened.counts(), (2, 3));
    assert_eq!(
        reopened.airport_names(),
        vec!["CHICAGO MIDWAY INTL".to_string(), "CHICAGO O'HARE INTL".to_string()]
    );
    assert_eq!(reopened.airports().lock().state(), StoreState::Valid);
}

#[test]
fn declining_the_cache_empties_both_stores() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path(), 10, 10);

    let caches = FacilityCaches::new(&settings);
    caches.initialize(true).unwrap();
    seed(&caches);
    caches.unload().unwrap();

    let reopened = FacilityCaches::new(&settings);
    assert!(reopened.initialize(false).unwrap());
    assert_eq!(reopened.counts(), (0, 0));
    assert!(reopened.airport_names().is_empty());
    assert_eq!(reopened.runways().lock().state(), StoreState::Rebuilding);
}

#[test]
fn open_follows_the_configured_use_existing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path(), 10, 10);

    let caches = FacilityCaches::new(&settings);
    caches.initialize(true).unwrap();
    seed(&caches);
    caches.unload().unwrap();

    assert!(settings.use_existing);
    let reopened = FacilityCaches::new(&settings);
    assert!(!reopened.open().unwrap());
    assert_eq!(reopened.counts(), (2, 3));
    drop(reopened);

    settings.use_existing = false;
    let declined = FacilityCaches::new(&settings);
    assert!(declined.open().unwrap());
    assert_eq!(declined.counts(), (0, 0));
}

#[test]
fn runway_version_change_rebuilds_airports_too() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path(), 10, 10);

    let caches = FacilityCaches::new(&settings);
    caches.initialize(true).unwrap();
    seed(&caches);
    caches.unload().unwrap();

    settings.runways.version = 2;
    let reopened = FacilityCaches::new(&settings);
    assert!(reopened.initialize(true).unwrap());
    assert_eq!(reopened.counts(), (0, 0));
}

#[test]
fn rebuild_is_stamped_with_the_configured_lifetime() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path(), 10, 10);
    let before = now_utc();

    let caches = FacilityCaches::new(&settings);
    caches.initialize(true).unwrap();

    let ttl = time::Duration::days(i64::from(settings.ttl_days));
    for expiry in [
        caches.airports().lock().invalidate_after(),
        caches.runways().lock().invalidate_after(),
    ] {
        assert!(expiry >= before + ttl);
        assert!(expiry <= now_utc() + ttl);
    }
}

#[test]
fn linking_requires_known_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let caches = FacilityCaches::new(&settings(tmp.path(), 10, 10));
    caches.initialize(true).unwrap();

    let airport = caches.add_airport(airport("LANSING MUNI", "IGQ", None)).unwrap();
    let runway = caches.add_runway(runway("09/27")).unwrap();

    assert!(matches!(
        caches.link_runway(airport, Uuid::from_u128(1)),
        Err(FeatureError::UnknownRunway(key)) if key == Uuid::from_u128(1)
    ));
    assert!(matches!(
        caches.link_runway(Uuid::from_u128(2), runway),
        Err(FeatureError::UnknownAirport(key)) if key == Uuid::from_u128(2)
    ));

    caches.link_runway(airport, runway).unwrap();
    caches.link_runway(airport, runway).unwrap();
    let linked = caches.airport(&airport).unwrap();
    assert_eq!(linked.runway_keys().copied().collect::<Vec<_>>(), vec![runway]);
}

#[test]
fn each_store_respects_its_own_capacity() {
    let tmp = tempfile::tempdir().unwrap();
    let caches = FacilityCaches::new(&settings(tmp.path(), 1, 1));
    caches.initialize(true).unwrap();
    let seeded = seed(&caches);

    assert!(caches.airports().lock().len() <= 1);
    assert!(caches.runways().lock().len() <= 1);

    let ohare = caches.airport(&seeded.ohare).unwrap();
    let midway = caches.airport(&seeded.midway).unwrap();
    assert_eq!(caches.airports().lock().resident_keys().collect::<Vec<_>>(), vec![&seeded.midway]);

    let designators = ohare
        .runways()
        .unwrap()
        .iter()
        .map(|runway| runway.designator.clone())
        .collect::<Vec<_>>();
    assert_eq!(designators, vec!["09L/27R".to_string(), "04L/22R".to_string()]);
    assert_eq!(caches.runways().lock().len(), 1);

    assert_eq!(midway.runways().unwrap()[0].designator, "13C/31C");
    assert_eq!(caches.runway(&seeded.runways[0]).unwrap().designator, "09L/27R");
}
