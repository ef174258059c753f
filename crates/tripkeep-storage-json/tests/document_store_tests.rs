use std::{fs, sync::Arc};

use chrono::{Duration, TimeZone, Utc};
use regex::Regex;
use serde_json::json;
use tempfile::tempdir;
use tripkeep_core::{Clock, ManualClock};
use tripkeep_domain::{CostData, Location, TravelData, TripRecord};
use tripkeep_storage_json::{DocumentStore, OsFileSystem, StoragePaths, StoreError};

fn store_at(root: &std::path::Path) -> (DocumentStore, Arc<ManualClock>, StoragePaths) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap(),
    ));
    let paths = StoragePaths::under(root);
    let store = DocumentStore::new(&paths, Arc::new(OsFileSystem), clock.clone() as Arc<dyn Clock>);
    (store, clock, paths)
}

fn sample_trip(clock: &ManualClock) -> TripRecord {
    let mut trip = TripRecord::with_id("trip-lisbon", "Lisbon long weekend", clock.now());
    trip.description = "Pasteis and trams".into();
    trip.cost_data = Some(CostData::new("EUR", 800.0));
    trip.travel_data = Some(TravelData {
        locations: vec![Location::new("loc-1", "Alfama")],
        ..TravelData::default()
    });
    trip.extra.insert("sharedWith".into(), json!(["ana"]));
    trip
}

#[test]
fn saved_record_loads_back_equal() {
    let dir = tempdir().expect("tempdir");
    let (store, clock, _) = store_at(dir.path());

    let mut trip = sample_trip(&clock);
    clock.advance(Duration::minutes(5));
    store.save(&mut trip).expect("save");
    assert_eq!(trip.updated_at, clock.now());

    let loaded = store.load("trip-lisbon").expect("load").expect("present");
    let loaded: TripRecord = serde_json::from_value(loaded).expect("typed");
    assert_eq!(loaded, trip);
    assert!(store.exists("trip-lisbon"));
}

#[test]
fn missing_record_loads_as_none() {
    let dir = tempdir().expect("tempdir");
    let (store, _, _) = store_at(dir.path());
    assert!(store.load("nope").expect("load").is_none());
    store.delete("nope").expect("deleting a missing record is a no-op");
}

#[test]
fn corrupted_tail_is_discarded_and_original_archived() {
    let dir = tempdir().expect("tempdir");
    let (store, clock, paths) = store_at(dir.path());
    let mut trip = sample_trip(&clock);
    store.save(&mut trip).expect("save");

    let path = store.record_path("trip-lisbon");
    let mut corrupted = fs::read(&path).expect("read");
    corrupted.extend_from_slice(&[0u8; 64]);
    corrupted.extend_from_slice(br#"{"id":"trip-lisbon","schemaVersion":3,"title":"stale"}"#);
    fs::write(&path, &corrupted).expect("corrupt");

    let loaded = store.load("trip-lisbon").expect("recovered").expect("present");
    assert_eq!(loaded["title"], json!("Lisbon long weekend"));

    let rewritten = fs::read(&path).expect("read rewritten");
    assert!(!rewritten.contains(&0u8));
    serde_json::from_slice::<serde_json::Value>(&rewritten).expect("clean json");

    let pattern = Regex::new(r"^corrupted-trip-trip-lisbon-\d{8}T\d{9}Z(_\d+)?\.json$").unwrap();
    let archives: Vec<_> = fs::read_dir(&paths.corrupted_dir)
        .expect("corrupted dir")
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(archives.len(), 1);
    let name = archives[0].file_name().unwrap().to_str().unwrap();
    assert!(pattern.is_match(name), "unexpected archive name {name}");
    assert_eq!(fs::read(&archives[0]).unwrap(), corrupted);
}

#[test]
fn repeated_recovery_in_the_same_instant_keeps_every_archive() {
    let dir = tempdir().expect("tempdir");
    let (store, _, paths) = store_at(dir.path());
    let path = store.record_path("t1");
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    for _ in 0..2 {
        fs::write(&path, b"{\"id\":\"t1\",\"schemaVersion\":5}\0\0junk").unwrap();
        store.load("t1").expect("recover").expect("present");
    }
    assert_eq!(fs::read_dir(&paths.corrupted_dir).unwrap().count(), 2);
}

#[test]
fn unrecoverable_file_is_left_untouched() {
    let dir = tempdir().expect("tempdir");
    let (store, _, paths) = store_at(dir.path());
    let path = store.record_path("broken");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let garbage = b"\0\0\0{\"id\": \"broken\"".to_vec();
    fs::write(&path, &garbage).unwrap();

    match store.load("broken") {
        Err(StoreError::DataCorruption { kind, id, .. }) => {
            assert_eq!(kind, "trip");
            assert_eq!(id, "broken");
        }
        other => panic!("expected corruption error, got {other:?}"),
    }
    assert_eq!(fs::read(&path).unwrap(), garbage);
    assert!(!paths.corrupted_dir.exists());
}

#[test]
fn document_without_required_keys_is_corruption() {
    let dir = tempdir().expect("tempdir");
    let (store, _, _) = store_at(dir.path());
    let path = store.record_path("keyless");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, br#"{"title":"no id here"}"#).unwrap();

    assert!(matches!(
        store.load("keyless"),
        Err(StoreError::DataCorruption { .. })
    ));
}

#[test]
fn list_ids_returns_sorted_ids() {
    let dir = tempdir().expect("tempdir");
    let (store, clock, _) = store_at(dir.path());
    for id in ["zeta", "alpha", "mid"] {
        let mut trip = TripRecord::with_id(id, id, clock.now());
        store.save(&mut trip).expect("save");
    }
    fs::write(store.record_path("ignored").with_extension("txt"), b"x").unwrap();

    assert_eq!(store.list_ids().unwrap(), ["alpha", "mid", "zeta"]);
    store.delete("mid").unwrap();
    assert_eq!(store.list_ids().unwrap(), ["alpha", "zeta"]);
}

#[test]
fn empty_ids_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let (store, clock, _) = store_at(dir.path());
    let mut trip = TripRecord::with_id("  ", "blank", clock.now());
    assert!(matches!(store.save(&mut trip), Err(StoreError::Core(_))));
}

#[test]
fn ids_differing_only_in_punctuation_keep_separate_files() {
    let dir = tempdir().expect("tempdir");
    let (store, clock, _) = store_at(dir.path());
    let ids = ["a.b", "a/b", "a_b"];
    for id in ids {
        let mut trip = TripRecord::with_id(id, format!("title of {id}"), clock.now());
        store.save(&mut trip).expect("save");
    }

    for id in ids {
        let loaded = store.load(id).expect("load").expect("present");
        assert_eq!(loaded["id"], json!(id));
        assert_eq!(loaded["title"], json!(format!("title of {id}")));
    }
    let paths: std::collections::HashSet<_> = ids.iter().map(|id| store.record_path(id)).collect();
    assert_eq!(paths.len(), 3);
    assert_eq!(store.list_ids().unwrap(), ["a.b", "a/b", "a_b"]);
}

#[test]
fn file_holding_another_id_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let (store, _, _) = store_at(dir.path());
    let path = store.record_path("trip-porto");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, br#"{"id":"trip-braga","schemaVersion":5}"#).unwrap();

    match store.load("trip-porto") {
        Err(StoreError::IdMismatch { requested, found, .. }) => {
            assert_eq!(requested, "trip-porto");
            assert_eq!(found, "trip-braga");
        }
        other => panic!("expected id mismatch, got {other:?}"),
    }
}
