//! Registry persistence, reload, and concurrency integration tests over the
//! YAML record store.

use std::sync::Arc;
use std::thread;

use assert_fs::prelude::*;
use chrono::Utc;
use deployd_core::{
    Layout, RecordStore, RecordingSink, Service, ServiceId, ServiceIdError, ServiceRegistry,
    StoreError, TracingSink, YamlStore,
};
use predicates::prelude::*;
use rstest::rstest;

fn id(raw: &str) -> ServiceId {
    ServiceId::parse(raw).expect("valid id")
}

fn service(layout: &Layout, raw: &str) -> Service {
    Service::new(id(raw), layout, Utc::now())
}

// ---------------------------------------------------------------------------
// 1. Identifier validation
// ---------------------------------------------------------------------------

#[rstest]
#[case("")]
#[case(".")]
#[case("..")]
#[case("../etc")]
#[case("a/b")]
#[case("a\\b")]
#[case("nul\0byte")]
#[case("-h")]
#[case("--now")]
fn rejects_unsafe_ids(#[case] raw: &str) {
    assert!(ServiceId::parse(raw).is_err(), "{raw:?} must be rejected");
}

#[rstest]
#[case("api.zip", "api")]
#[case("my api.zip", "myapi")]
#[case(" worker\t.zip", "worker")]
#[case("tool", "tool")]
#[case("release.tar", "release.tar")]
fn derives_ids_from_artifact_names(#[case] declared: &str, #[case] expected: &str) {
    assert_eq!(
        ServiceId::from_artifact_name(declared).expect("derivable").as_str(),
        expected
    );
}

#[test]
fn empty_artifact_name_is_rejected() {
    assert_eq!(
        ServiceId::from_artifact_name(".zip"),
        Err(ServiceIdError::Empty)
    );
}

// ---------------------------------------------------------------------------
// 2. Write-through and reload
// ---------------------------------------------------------------------------

#[test]
fn put_writes_one_record_file_per_service() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let layout = Layout::new(root.path());
    let store = Arc::new(YamlStore::new(layout.data_dir()));
    let registry = ServiceRegistry::open(store, Arc::new(TracingSink));

    registry.put(service(&layout, "api")).expect("put");
    registry.put(service(&layout, "api")).expect("put again");

    let record = root.child("data/services/api.yaml");
    record.assert(predicate::path::is_file());
    record.assert(predicate::str::contains("id: api"));
    root.child("data/services/api.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn reopened_registry_sees_persisted_services() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let layout = Layout::new(root.path());
    {
        let store = Arc::new(YamlStore::new(layout.data_dir()));
        let registry = ServiceRegistry::open(store, Arc::new(TracingSink));
        registry.put(service(&layout, "api")).expect("put api");
        registry.put(service(&layout, "worker")).expect("put worker");
        registry.remove(&id("worker")).expect("remove worker");
    }

    let store = Arc::new(YamlStore::new(layout.data_dir()));
    let registry = ServiceRegistry::open(store, Arc::new(TracingSink));
    assert!(registry.contains(&id("api")));
    assert!(!registry.contains(&id("worker")));
    assert_eq!(
        registry.get(&id("api")).map(|s| s.location),
        Some(layout.service_dir(&id("api")))
    );
}

#[test]
fn corrupt_store_does_not_fail_startup() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("data/services/api.yaml")
        .write_str("- not a mapping\n")
        .expect("write corrupt record");

    let sink = Arc::new(RecordingSink::new());
    let store = Arc::new(YamlStore::new(root.path().join("data")));
    let registry = ServiceRegistry::open(store, sink.clone());

    assert!(registry.is_empty());
    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("api.yaml"), "got: {reports:?}");
}

#[test]
fn resync_surfaces_store_errors_and_keeps_map() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let layout = Layout::new(root.path());
    let store = Arc::new(YamlStore::new(layout.data_dir()));
    let registry = ServiceRegistry::open(store, Arc::new(TracingSink));
    registry.put(service(&layout, "api")).expect("put");

    root.child("data/services/broken.yaml")
        .write_str(": : :")
        .expect("write corrupt record");

    let err = registry.resync().unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(registry.contains(&id("api")));
}

// ---------------------------------------------------------------------------
// 3. Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_puts_with_distinct_ids_all_land() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let layout = Layout::new(root.path());
    let store = Arc::new(YamlStore::new(layout.data_dir()));
    let registry = Arc::new(ServiceRegistry::open(store.clone(), Arc::new(TracingSink)));

    thread::scope(|scope| {
        for n in 0..16 {
            let registry = registry.clone();
            let layout = layout.clone();
            scope.spawn(move || {
                registry
                    .put(service(&layout, &format!("svc{n}")))
                    .expect("put");
                assert!(registry.contains(&id(&format!("svc{n}"))));
            });
        }
    });

    assert_eq!(registry.len(), 16);
    assert_eq!(store.load_services().expect("load").len(), 16);
}

#[test]
fn concurrent_touches_leave_one_record() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let layout = Layout::new(root.path());
    let store = Arc::new(YamlStore::new(layout.data_dir()));
    let registry = Arc::new(ServiceRegistry::open(store.clone(), Arc::new(TracingSink)));
    registry.put(service(&layout, "api")).expect("put");

    thread::scope(|scope| {
        for _ in 0..8 {
            let registry = registry.clone();
            scope.spawn(move || {
                registry.touch(&id("api"));
                let _ = registry.list();
            });
        }
    });

    let records = store.load_services().expect("load");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id("api"));
}
