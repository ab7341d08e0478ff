//! Create / get / update / remove, versions and comparison.

use serde_json::json;
use snapshot_store::{
    MetadataPatch, NewSnapshot, SnapshotMetadata, SnapshotStatus, SnapshotStoreConfig,
    SnapshotStore, SnapshotUpdate, StoreError,
};

use crate::support::store;

#[test]
fn create_then_get() {
    let store = store("tasks");
    let created = store
        .create(
            NewSnapshot::new("t1", json!({"title": "write docs"}))
                .in_category("work")
                .with_metadata(SnapshotMetadata::new().with_author("kim").with_tag("docs")),
        )
        .unwrap();

    assert_eq!(created.version, 1);
    assert_eq!(created.status, SnapshotStatus::Active);
    assert_eq!(store.get("t1").unwrap(), created);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn duplicate_create_leaves_table_unchanged() {
    let store = store("tasks");
    store.create(NewSnapshot::new("t1", json!({"v": 1}))).unwrap();

    let err = store
        .create(NewSnapshot::new("t1", json!({"v": 2})))
        .unwrap_err();

    assert_eq!(err, StoreError::DuplicateId("t1".into()));
    assert_eq!(store.get("t1").unwrap().payload, json!({"v": 1}));
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn get_missing_is_not_found() {
    let store = store("tasks");
    assert_eq!(
        store.get("nope").unwrap_err(),
        StoreError::NotFound("nope".into())
    );
}

#[test]
fn update_links_versions_and_archives_previous() {
    let store = store("tasks");
    store
        .create(NewSnapshot::new("s1", json!({"x": 1})).in_category("cat-A"))
        .unwrap();

    let updated = store
        .update("s1", SnapshotUpdate::payload(json!({"x": 2})))
        .unwrap();

    let current = store.get("s1").unwrap();
    assert_eq!(current, updated);
    assert_eq!(current.payload["x"], json!(2));
    assert_eq!(current.version, 2);
    assert_eq!(current.previous_version_id.as_deref(), Some("s1@v1"));

    let original = store.get("s1@v1").unwrap();
    assert_eq!(original.status, SnapshotStatus::Archived);
    assert_eq!(original.next_version_id.as_deref(), Some("s1@v2"));
    assert_eq!(original.payload, json!({"x": 1}));
    assert_eq!(store.get_version("s1", 1).unwrap(), original);
}

#[test]
fn keep_previous_versions_active() {
    let store = SnapshotStore::new(
        SnapshotStoreConfig::new("tasks").with_keep_previous_versions_active(true),
    );
    store.create(NewSnapshot::new("s1", json!({"x": 1}))).unwrap();
    store
        .update("s1", SnapshotUpdate::payload(json!({"x": 2})))
        .unwrap();

    assert_eq!(store.get("s1@v1").unwrap().status, SnapshotStatus::Active);
}

#[test]
fn version_chain_walks_back_to_the_root() {
    let store = store("tasks");
    store.create(NewSnapshot::new("s1", json!({"n": 0}))).unwrap();
    for n in 1..=5 {
        store
            .update("s1", SnapshotUpdate::payload(json!({"n": n})))
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor = Some(store.get("s1").unwrap().version_id);
    while let Some(version_id) = cursor {
        assert!(!seen.contains(&version_id), "revisited {}", version_id);
        let snapshot = store.get(&version_id).unwrap();
        cursor = snapshot.previous_version_id.clone();
        seen.push(version_id);
    }

    assert_eq!(seen.len(), 6);
    assert_eq!(seen.last().map(String::as_str), Some("s1@v1"));

    let history = store.history("s1").unwrap();
    let versions: Vec<u64> = history.iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn partial_payload_and_metadata_merge() {
    let store = store("tasks");
    store
        .create(
            NewSnapshot::new("t1", json!({"title": "a", "done": false, "tmp": 1}))
                .with_metadata(SnapshotMetadata::new().with_author("kim").with_tag("x")),
        )
        .unwrap();

    let updated = store
        .update(
            "t1",
            SnapshotUpdate::payload(json!({"done": true, "tmp": null}))
                .with_metadata(MetadataPatch::new().description("shipped")),
        )
        .unwrap();

    assert_eq!(updated.payload, json!({"title": "a", "done": true}));
    assert_eq!(updated.metadata.author.as_deref(), Some("kim"));
    assert_eq!(updated.metadata.tags, vec!["x"]);
    assert_eq!(updated.metadata.description.as_deref(), Some("shipped"));

    let audit = updated.audit_trail.last().unwrap();
    assert_eq!(audit.actor, "kim");
    assert_eq!(audit.changed_fields, vec!["payload", "metadata.description"]);
}

#[test]
fn update_with_stale_version_conflicts() {
    let store = store("tasks");
    store.create(NewSnapshot::new("t1", json!({}))).unwrap();
    store
        .update("t1", SnapshotUpdate::payload(json!({"a": 1})))
        .unwrap();

    let err = store
        .update(
            "t1",
            SnapshotUpdate::payload(json!({"a": 2})).expecting_version(1),
        )
        .unwrap_err();

    assert_eq!(
        err,
        StoreError::Conflict {
            id: "t1".into(),
            expected: 1,
            actual: 2
        }
    );
    assert_eq!(store.get("t1").unwrap().payload, json!({"a": 1}));

    store
        .update(
            "t1",
            SnapshotUpdate::payload(json!({"a": 3})).expecting_version(2),
        )
        .unwrap();
}

#[test]
fn update_missing_is_not_found() {
    let store = store("tasks");
    assert_eq!(
        store
            .update("ghost", SnapshotUpdate::payload(json!(1)))
            .unwrap_err(),
        StoreError::NotFound("ghost".into())
    );
}

#[test]
fn ids_shaped_like_version_ids_do_not_block_updates() {
    let store = store("tasks");
    store.create(NewSnapshot::new("a", json!({"x": 1}))).unwrap();
    store.create(NewSnapshot::new("a@v2", json!({"y": 1}))).unwrap();

    let updated = store
        .update("a", SnapshotUpdate::payload(json!({"x": 2})))
        .unwrap();
    assert_eq!(updated.version_id, "a@v2");
    assert_eq!(updated.payload, json!({"x": 2}));

    assert_eq!(store.get("a@v2").unwrap().payload, json!({"y": 1}));
    assert_eq!(store.get_version("a", 2).unwrap().payload, json!({"x": 2}));
    assert_eq!(store.get_version("a", 1).unwrap().payload, json!({"x": 1}));
    assert_eq!(store.history("a").unwrap().len(), 2);

    store
        .update("a@v2", SnapshotUpdate::payload(json!({"y": 2})))
        .unwrap();
    assert_eq!(store.get_version("a@v2", 2).unwrap().payload, json!({"y": 2}));
}

#[test]
fn remove_deletes_lineage() {
    let store = store("tasks");
    store.create(NewSnapshot::new("t1", json!({}))).unwrap();
    store
        .update("t1", SnapshotUpdate::payload(json!({"a": 1})))
        .unwrap();

    let removed = store.remove("t1").unwrap();
    assert_eq!(removed.version, 2);
    assert!(matches!(store.get("t1"), Err(StoreError::NotFound(_))));
    assert!(matches!(store.get("t1@v1"), Err(StoreError::NotFound(_))));
    assert_eq!(
        store.remove("t1").unwrap_err(),
        StoreError::NotFound("t1".into())
    );

    // The id is free again once the lineage is gone.
    store.create(NewSnapshot::new("t1", json!({}))).unwrap();
}

#[test]
fn compare_reports_differing_fields() {
    let store = store("tasks");
    store
        .create(NewSnapshot::new("a", json!({"x": 1})).in_category("c"))
        .unwrap();
    store
        .update("a", SnapshotUpdate::payload(json!({"x": 2})))
        .unwrap();

    let diff = store.compare("a@v1", "a").unwrap();
    assert_eq!(diff["payload"].left, json!({"x": 1}));
    assert_eq!(diff["payload"].right, json!({"x": 2}));
    assert_eq!(diff["version"].left, json!(1));
    assert_eq!(diff["version"].right, json!(2));
    assert!(!diff.contains_key("id"));
    assert!(!diff.contains_key("category"));

    assert!(matches!(
        store.compare("a", "missing"),
        Err(StoreError::NotFound(_))
    ));
}
