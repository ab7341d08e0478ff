//! Index-backed queries.

use std::time::{Duration, SystemTime};

use serde_json::json;
use snapshot_store::{
    Category, CriteriaOperator, Criterion, MetadataPatch, NewSnapshot, SnapshotFilter,
    SnapshotMetadata, SnapshotStatus, SnapshotStore, SnapshotStoreConfig, SnapshotUpdate,
};

use crate::support::store;

fn ids(store: &SnapshotStore, filter: &SnapshotFilter) -> Vec<String> {
    store
        .query(filter)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[test]
fn updated_snapshot_is_the_only_match_for_its_category() {
    let store = store("tasks");
    store
        .create(NewSnapshot::new("s1", json!({"x": 1})).in_category("cat-A"))
        .unwrap();
    store
        .update("s1", SnapshotUpdate::payload(json!({"x": 2})))
        .unwrap();

    let found = store
        .query(&SnapshotFilter::new().category("cat-A"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "s1");
    assert_eq!(found[0].payload["x"], json!(2));
}

#[test]
fn filters_intersect() {
    let store = store("tasks");
    let tagged = |tag: &str| SnapshotMetadata::new().with_tag(tag);
    store
        .create(NewSnapshot::new("a", json!({})).in_category("work").with_metadata(tagged("urgent")))
        .unwrap();
    store
        .create(NewSnapshot::new("b", json!({})).in_category("work"))
        .unwrap();
    store
        .create(NewSnapshot::new("c", json!({})).in_category("home").with_metadata(tagged("urgent")))
        .unwrap();
    store
        .create(
            NewSnapshot::new("d", json!({}))
                .in_category("work")
                .with_status(SnapshotStatus::Pending)
                .with_metadata(tagged("urgent")),
        )
        .unwrap();

    assert_eq!(ids(&store, &SnapshotFilter::new().category("work")), vec!["a", "b", "d"]);
    assert_eq!(ids(&store, &SnapshotFilter::new().tag("urgent")), vec!["a", "c", "d"]);
    assert_eq!(
        ids(&store, &SnapshotFilter::new().category("work").tag("urgent")),
        vec!["a", "d"]
    );
    assert_eq!(
        ids(
            &store,
            &SnapshotFilter::new()
                .category("work")
                .tag("urgent")
                .status(SnapshotStatus::Active)
        ),
        vec!["a"]
    );
    assert_eq!(ids(&store, &SnapshotFilter::new()), vec!["a", "b", "c", "d"]);
}

#[test]
fn index_follows_metadata_and_status_changes() {
    let store = store("tasks");
    store
        .create(NewSnapshot::new("a", json!({})).with_metadata(SnapshotMetadata::new().with_tag("old")))
        .unwrap();

    store
        .update(
            "a",
            SnapshotUpdate::new().with_metadata(MetadataPatch::new().tags(["new"])),
        )
        .unwrap();
    assert!(ids(&store, &SnapshotFilter::new().tag("old")).is_empty());
    assert_eq!(ids(&store, &SnapshotFilter::new().tag("new")), vec!["a"]);

    store.archive("a").unwrap();
    assert!(ids(&store, &SnapshotFilter::new().status(SnapshotStatus::Active)).is_empty());
    assert_eq!(
        ids(&store, &SnapshotFilter::new().status(SnapshotStatus::Archived)),
        vec!["a"]
    );

    store.remove("a").unwrap();
    assert!(ids(&store, &SnapshotFilter::new()).is_empty());
}

#[test]
fn expired_snapshots_are_hidden_by_default() {
    let store = store("tasks");
    let past = SystemTime::now() - Duration::from_secs(60);
    let future = SystemTime::now() + Duration::from_secs(3600);

    store
        .create(NewSnapshot::new("gone", json!({})).in_category("c").expires_at(past))
        .unwrap();
    store
        .create(NewSnapshot::new("live", json!({})).in_category("c").expires_at(future))
        .unwrap();
    store
        .create(
            NewSnapshot::new("marked", json!({}))
                .in_category("c")
                .with_status(SnapshotStatus::Expired),
        )
        .unwrap();

    assert_eq!(ids(&store, &SnapshotFilter::new().category("c")), vec!["live"]);
    assert_eq!(
        ids(&store, &SnapshotFilter::new().category("c").including_expired()),
        vec!["gone", "live", "marked"]
    );
    assert_eq!(
        ids(&store, &SnapshotFilter::new().status(SnapshotStatus::Expired)),
        vec!["gone", "marked"]
    );
    assert_eq!(
        ids(&store, &SnapshotFilter::new().status(SnapshotStatus::Active)),
        vec!["live"]
    );
    assert_eq!(
        ids(
            &store,
            &SnapshotFilter::new()
                .status(SnapshotStatus::Active)
                .including_expired()
        ),
        vec!["gone", "live"]
    );

    assert_eq!(store.expire_due().unwrap(), vec!["gone"]);
    assert_eq!(
        ids(&store, &SnapshotFilter::new().status(SnapshotStatus::Expired)),
        vec!["gone", "marked"]
    );
    assert!(store.expire_due().unwrap().is_empty());
}

#[test]
fn category_shapes_index_separately() {
    let store = store("tasks");
    store
        .create(NewSnapshot::new("n", json!({})).in_category("reports"))
        .unwrap();
    store
        .create(NewSnapshot::new("s", json!({})).in_category(Category::symbol("reports")))
        .unwrap();
    store
        .create(
            NewSnapshot::new("o", json!({}))
                .in_category(Category::structured("reports").with_attribute("scope", "q3")),
        )
        .unwrap();

    assert_eq!(ids(&store, &SnapshotFilter::new().category("reports")), vec!["n", "o"]);
    assert_eq!(
        ids(&store, &SnapshotFilter::new().category(Category::symbol("reports"))),
        vec!["s"]
    );
}

#[test]
fn criteria_from_config() {
    let config = SnapshotStoreConfig::new("tasks")
        .with_category("work")
        .with_criterion(Criterion::new(
            "payload.priority",
            CriteriaOperator::Gte,
            json!(2),
        ));
    let store = SnapshotStore::new(config);

    store.create(NewSnapshot::new("low", json!({"priority": 1}))).unwrap();
    store.create(NewSnapshot::new("high", json!({"priority": 3}))).unwrap();
    store
        .create(NewSnapshot::new("other", json!({"priority": 5})).in_category("home"))
        .unwrap();

    let filter = SnapshotFilter::from_config(store.config());
    assert_eq!(ids(&store, &filter), vec!["high"]);

    let by_author = SnapshotFilter::new().criterion(Criterion::new(
        "metadata.author",
        CriteriaOperator::Exists,
        json!(null),
    ));
    assert!(ids(&store, &by_author).is_empty());
}
