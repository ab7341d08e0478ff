//! Batched take / fetch / update through the store.

use std::sync::{Arc, Mutex};

use serde_json::json;
use snapshot_store::bus::{InMemoryNotificationBus, BATCH_FAILURE};
use snapshot_store::{
    BatchEvent, CancellationToken, FnSubscriber, NewSnapshot, SimulatedDataSource,
    DelegateResolver, SnapshotStore, SnapshotStoreConfig, SnapshotUpdate, StoreError,
    SubscriberRegistry, SubscriptionScope, TakeItem, UpdateItem,
};

fn watched(store: SnapshotStore) -> (SnapshotStore, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    store
        .subscribe(
            Arc::new(FnSubscriber::new("batch-log").on_batch(move |store_id, event| {
                let line = match event {
                    BatchEvent::Requested { operation, ids } => {
                        format!("{}:{}:requested:{}", store_id, operation.as_str(), ids.join(","))
                    }
                    BatchEvent::Succeeded {
                        operation,
                        snapshots,
                    } => {
                        let ids: Vec<&str> = snapshots.iter().map(|s| s.id.as_str()).collect();
                        format!("{}:{}:succeeded:{}", store_id, operation.as_str(), ids.join(","))
                    }
                    BatchEvent::Failed {
                        operation,
                        failures,
                    } => {
                        let ids: Vec<&str> = failures.iter().map(|f| f.id.as_str()).collect();
                        format!("{}:{}:failed:{}", store_id, operation.as_str(), ids.join(","))
                    }
                };
                sink.lock().unwrap().push(line);
                Ok(())
            })),
            SubscriptionScope::store(store.store_id()),
        )
        .unwrap();
    (store, log)
}

#[test]
fn take_with_one_bad_item_is_partially_successful() {
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks").with_category("inbox"));
    store.create(NewSnapshot::new("taken", json!({}))).unwrap();
    let (store, log) = watched(store);

    let items = vec![
        TakeItem::new("a", json!({"n": 1})),
        TakeItem::new("taken", json!({"n": 2})),
        TakeItem::new("c", json!({"n": 3})).in_category("work"),
    ];
    let result = store
        .batch_take(&items, &CancellationToken::new())
        .unwrap();

    assert_eq!(result.succeeded_ids(), vec!["a", "c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].id, "taken");
    assert_eq!(result.failed[0].reason, StoreError::DuplicateId("taken".into()));

    assert_eq!(store.get("a").unwrap().category.to_string(), "inbox");
    assert_eq!(store.get("c").unwrap().category.to_string(), "work");
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "tasks:take:requested:a,taken,c",
            "tasks:take:succeeded:a,c",
            "tasks:take:failed:taken",
        ]
    );
}

#[test]
fn update_batch_reports_missing_ids_per_item() {
    let (store, log) = watched(SnapshotStore::new(SnapshotStoreConfig::new("tasks")));
    for id in ["a", "b", "c", "d", "e"] {
        store.create(NewSnapshot::new(id, json!({"n": 0}))).unwrap();
    }

    let mut items: Vec<UpdateItem> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|id| UpdateItem::new(*id, SnapshotUpdate::payload(json!({"n": 1}))))
        .collect();
    items[2] = UpdateItem::new("ghost", SnapshotUpdate::payload(json!({"n": 1})));

    let result = store
        .batch_update(&items, &CancellationToken::new())
        .unwrap();

    assert_eq!(result.succeeded.len(), 4);
    assert_eq!(result.failed_ids(), vec!["ghost"]);
    assert_eq!(result.failed[0].reason, StoreError::NotFound("ghost".into()));
    assert!(result.succeeded.iter().all(|s| s.version == 2));
    assert_eq!(store.get("c").unwrap().version, 1);
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn all_successful_batch_emits_no_failure() {
    let (store, log) = watched(SnapshotStore::new(SnapshotStoreConfig::new("tasks")));
    let items = vec![TakeItem::new("a", json!(1)), TakeItem::new("b", json!(2))];

    let result = store
        .batch_take(&items, &CancellationToken::new())
        .unwrap();

    assert!(result.is_complete_success());
    assert_eq!(
        *log.lock().unwrap(),
        vec!["tasks:take:requested:a,b", "tasks:take:succeeded:a,b"]
    );
}

#[test]
fn invalid_batch_short_circuits() {
    let (store, log) = watched(SnapshotStore::new(SnapshotStoreConfig::new("tasks")));

    assert!(matches!(
        store.batch_take(&[], &CancellationToken::new()),
        Err(StoreError::InvalidBatch(_))
    ));
    let dupes = vec![TakeItem::new("a", json!(1)), TakeItem::new("a", json!(2))];
    assert!(matches!(
        store.batch_take(&dupes, &CancellationToken::new()),
        Err(StoreError::InvalidBatch(_))
    ));

    assert!(store.is_empty().unwrap());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn cancelled_batch_starts_nothing() {
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let items = vec![TakeItem::new("a", json!(1)), TakeItem::new("b", json!(2))];
    let result = store.batch_take(&items, &cancel).unwrap();

    assert!(result.succeeded.is_empty());
    assert!(result
        .failed
        .iter()
        .all(|f| f.reason == StoreError::Cancelled));
    assert!(store.is_empty().unwrap());
}

#[test]
fn cancelling_mid_batch_keeps_finished_items() {
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks").with_batch_workers(1));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    store
        .subscribe(
            Arc::new(FnSubscriber::new("canceller").on_added(move |event| {
                if event.snapshot.id == "b" {
                    trigger.cancel();
                }
                Ok(())
            })),
            SubscriptionScope::store("tasks"),
        )
        .unwrap();

    let items: Vec<TakeItem> = ["a", "b", "c", "d"]
        .iter()
        .map(|id| TakeItem::new(*id, json!({})))
        .collect();
    let result = store.batch_take(&items, &cancel).unwrap();

    assert_eq!(result.succeeded_ids(), vec!["a", "b"]);
    assert_eq!(result.failed_ids(), vec!["c", "d"]);
    assert!(matches!(store.get("c"), Err(StoreError::NotFound(_))));
}

#[test]
fn fetch_batch_upserts_from_the_data_source() {
    let source = SimulatedDataSource::new()
        .with_response("tasks", "a", json!({"title": "from source"}));
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks").with_simulated_data_source(true))
        .with_resolver(DelegateResolver::new(Arc::new(source)));
    store.create(NewSnapshot::new("b", json!({"local": true}))).unwrap();

    let ids = vec!["a".to_string(), "b".to_string()];
    let result = store
        .batch_fetch(&ids, &CancellationToken::new())
        .unwrap();

    assert!(result.is_complete_success());
    assert_eq!(store.get("a").unwrap().payload, json!({"title": "from source"}));
    let b = store.get("b").unwrap();
    assert_eq!(b.version, 2);
    assert_eq!(b.payload["simulated"], json!(true));
    assert_eq!(b.payload["local"], json!(true));
}

#[test]
fn batch_failures_reach_the_bus() {
    let bus = Arc::new(InMemoryNotificationBus::new());
    let registry = Arc::new(SubscriberRegistry::new().with_bus(bus.clone()));
    let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks")).with_registry(registry);

    let items = vec![UpdateItem::new("missing", SnapshotUpdate::payload(json!(1)))];
    let result = store
        .batch_update(&items, &CancellationToken::new())
        .unwrap();

    assert_eq!(result.failed.len(), 1);
    let messages = bus.find_all_by_type(BATCH_FAILURE);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload["operation"], json!("update"));
    assert_eq!(messages[0].payload["failed"][0]["id"], json!("missing"));
}
