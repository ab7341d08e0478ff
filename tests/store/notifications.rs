//! Subscriber fan-out.

use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::json;
use snapshot_store::bus::{InMemoryNotificationBus, SUBSCRIBER_ERROR};
use snapshot_store::{
    FnSubscriber, NewSnapshot, SnapshotStore, SnapshotStoreConfig, SnapshotUpdate, StoreError,
    SubscriberRegistry, SubscriptionScope,
};

use crate::support::{observed_store, Recorder};

#[test]
fn every_mutation_notifies_once_in_commit_order() {
    let (store, recorder) = observed_store("tasks");

    store.create(NewSnapshot::new("a", json!({}))).unwrap();
    store.create(NewSnapshot::new("b", json!({}))).unwrap();
    store
        .update("a", SnapshotUpdate::payload(json!({"x": 1})))
        .unwrap();
    store.remove("b").unwrap();

    assert_eq!(
        recorder.events(),
        vec!["added:a:1", "added:b:2", "updated:a:3", "removed:b:4"]
    );
}

#[test]
fn failed_mutations_do_not_notify() {
    let (store, recorder) = observed_store("tasks");
    store.create(NewSnapshot::new("a", json!({}))).unwrap();

    assert!(store.create(NewSnapshot::new("a", json!({}))).is_err());
    assert!(store
        .update("zzz", SnapshotUpdate::payload(json!(1)))
        .is_err());
    assert!(store.remove("zzz").is_err());

    assert_eq!(recorder.kinds(), vec!["added:a"]);
}

#[test]
fn category_scope_filters() {
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks"));
    let work = Recorder::new("work");
    let all = Recorder::new("all");
    store
        .subscribe(work.clone(), SubscriptionScope::store("tasks").with_category("work"))
        .unwrap();
    store
        .subscribe(all.clone(), SubscriptionScope::store("tasks"))
        .unwrap();

    store
        .create(NewSnapshot::new("w", json!({})).in_category("work"))
        .unwrap();
    store
        .create(NewSnapshot::new("h", json!({})).in_category("home"))
        .unwrap();

    assert_eq!(work.kinds(), vec!["added:w"]);
    assert_eq!(all.kinds(), vec!["added:w", "added:h"]);
}

#[test]
fn duplicate_subscriber_id_is_rejected_and_unsubscribe_stops_delivery() {
    let (store, recorder) = observed_store("tasks");

    let again = Recorder::new("recorder");
    assert_eq!(
        store
            .subscribe(again, SubscriptionScope::store("tasks"))
            .unwrap_err(),
        StoreError::DuplicateId("recorder".into())
    );

    let other = Recorder::new("other");
    let handle = store
        .subscribe(other.clone(), SubscriptionScope::store("tasks"))
        .unwrap();
    assert!(store.unsubscribe(&handle).unwrap());
    assert!(!store.unsubscribe(&handle).unwrap());

    store.create(NewSnapshot::new("a", json!({}))).unwrap();
    assert!(other.events().is_empty());
    assert_eq!(recorder.kinds(), vec!["added:a"]);
}

#[test]
fn failing_subscriber_does_not_block_others() {
    let bus = Arc::new(InMemoryNotificationBus::new());
    let registry = Arc::new(SubscriberRegistry::new().with_bus(bus.clone()));
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks")).with_registry(registry);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    store
        .subscribe(
            Arc::new(
                FnSubscriber::new("broken")
                    .on_added(|_| Err("renderer crashed".into()))
                    .on_error(move |err| sink.lock().unwrap().push(err.clone())),
            ),
            SubscriptionScope::store("tasks"),
        )
        .unwrap();
    store
        .subscribe(
            Arc::new(FnSubscriber::new("panics").on_added(|_| panic!("boom"))),
            SubscriptionScope::store("tasks"),
        )
        .unwrap();
    let healthy = Recorder::new("healthy");
    store
        .subscribe(healthy.clone(), SubscriptionScope::store("tasks"))
        .unwrap();

    store.create(NewSnapshot::new("a", json!({}))).unwrap();

    assert_eq!(healthy.kinds(), vec!["added:a"]);
    assert_eq!(
        *errors.lock().unwrap(),
        vec![StoreError::Subscriber {
            subscriber_id: "broken".into(),
            reason: "renderer crashed".into()
        }]
    );
    assert_eq!(bus.find_all_by_type(SUBSCRIBER_ERROR).len(), 2);
}

#[test]
fn callbacks_may_read_and_write_the_store() {
    let store = Arc::new(SnapshotStore::new(SnapshotStoreConfig::new("tasks")));
    let recorder = Recorder::new("recorder");
    store
        .subscribe(recorder.clone(), SubscriptionScope::store("tasks"))
        .unwrap();

    let inner = Arc::downgrade(&store);
    store
        .subscribe(
            Arc::new(FnSubscriber::new("mirror").on_added(move |event| {
                let Some(store) = inner.upgrade() else {
                    return Ok(());
                };
                if !event.snapshot.id.ends_with("-copy") {
                    assert!(store.get(&event.snapshot.id).is_ok());
                    store.create(NewSnapshot::new(
                        format!("{}-copy", event.snapshot.id),
                        event.snapshot.payload.clone(),
                    ))?;
                }
                Ok(())
            })),
            SubscriptionScope::store("tasks"),
        )
        .unwrap();

    store.create(NewSnapshot::new("a", json!({"v": 1}))).unwrap();

    assert_eq!(store.get("a-copy").unwrap().payload, json!({"v": 1}));
    assert_eq!(recorder.events(), vec!["added:a:1", "added:a-copy:2"]);
}

#[test]
fn shared_registry_routes_by_store() {
    let registry = Arc::new(SubscriberRegistry::new());
    let tasks = SnapshotStore::new(SnapshotStoreConfig::new("tasks"))
        .with_registry(Arc::clone(&registry));
    let teams = SnapshotStore::new(SnapshotStoreConfig::new("teams"))
        .with_registry(Arc::clone(&registry));

    let recorder = Recorder::new("recorder");
    registry
        .subscribe(recorder.clone(), SubscriptionScope::store("teams"))
        .unwrap();

    tasks.create(NewSnapshot::new("t", json!({}))).unwrap();
    teams.create(NewSnapshot::new("x", json!({}))).unwrap();

    assert_eq!(recorder.kinds(), vec!["added:x"]);
}

#[test]
fn concurrent_writers_deliver_in_sequence_order() {
    let (store, recorder) = observed_store("tasks");
    let store = Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..25 {
                    store
                        .create(NewSnapshot::new(format!("w{}-{}", worker, n), json!(n)))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let sequences: Vec<u64> = recorder
        .events()
        .iter()
        .map(|e| e.rsplit(':').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(sequences, (1..=100).collect::<Vec<u64>>());
}
