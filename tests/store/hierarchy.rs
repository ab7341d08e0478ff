//! Parent/child links through the store.

use serde_json::json;
use snapshot_store::{AuditAction, NewSnapshot, SnapshotStore, StoreError};

use crate::support::store;

fn seeded(ids: &[&str]) -> SnapshotStore {
    let store = store("tree");
    for id in ids {
        store.create(NewSnapshot::new(*id, json!({}))).unwrap();
    }
    store
}

#[test]
fn reverse_attach_is_a_cycle() {
    let store = seeded(&["p1", "c1"]);
    store.attach_child("p1", "c1").unwrap();

    let err = store.attach_child("c1", "p1").unwrap_err();
    assert_eq!(
        err,
        StoreError::CycleDetected {
            parent: "c1".into(),
            child: "p1".into()
        }
    );
    assert_eq!(store.get_children("p1").unwrap(), vec!["c1"]);
    assert!(store.get_children("c1").unwrap().is_empty());
    assert_eq!(store.get_parent_id("p1").unwrap(), None);
}

#[test]
fn deep_cycle_leaves_tree_unchanged() {
    let store = seeded(&["a", "b", "c", "d"]);
    store.attach_child("a", "b").unwrap();
    store.attach_child("b", "c").unwrap();
    store.attach_child("c", "d").unwrap();

    assert!(matches!(
        store.attach_child("d", "a"),
        Err(StoreError::CycleDetected { .. })
    ));
    assert!(matches!(
        store.attach_child("a", "a"),
        Err(StoreError::CycleDetected { .. })
    ));
    assert_eq!(store.descendants_of("a").unwrap(), vec!["b", "c", "d"]);
    assert!(store.is_descendant_of("d", "a").unwrap());
    assert!(!store.is_descendant_of("a", "d").unwrap());
}

#[test]
fn snapshots_mirror_links() {
    let store = seeded(&["p", "c"]);
    let child = store.attach_child("p", "c").unwrap();

    assert_eq!(child.parent_id.as_deref(), Some("p"));
    assert_eq!(
        child.audit_trail.last().map(|r| r.action),
        Some(AuditAction::Attached)
    );
    assert_eq!(store.get("p").unwrap().child_ids, vec!["c"]);
}

#[test]
fn attaching_moves_child_between_parents() {
    let store = seeded(&["p1", "p2", "c"]);
    store.attach_child("p1", "c").unwrap();
    store.attach_child("p2", "c").unwrap();

    assert!(store.get_children("p1").unwrap().is_empty());
    assert_eq!(store.get_children("p2").unwrap(), vec!["c"]);
    assert_eq!(store.get_parent_id("c").unwrap().as_deref(), Some("p2"));
    assert!(store.get("p1").unwrap().child_ids.is_empty());
}

#[test]
fn detach_unlinks() {
    let store = seeded(&["p", "c"]);
    store.attach_child("p", "c").unwrap();

    assert!(store.detach_child("p", "c").unwrap());
    assert!(!store.detach_child("p", "c").unwrap());
    assert_eq!(store.get("c").unwrap().parent_id, None);
    assert!(store.get("p").unwrap().child_ids.is_empty());
}

#[test]
fn removing_a_node_reparents_its_children() {
    let store = seeded(&["root", "mid", "leaf1", "leaf2"]);
    store.attach_child("root", "mid").unwrap();
    store.attach_child("mid", "leaf1").unwrap();
    store.attach_child("mid", "leaf2").unwrap();

    store.remove("mid").unwrap();

    assert_eq!(store.get_children("root").unwrap(), vec!["leaf1", "leaf2"]);
    assert_eq!(store.get("leaf1").unwrap().parent_id.as_deref(), Some("root"));
    assert_eq!(store.get("root").unwrap().child_ids, vec!["leaf1", "leaf2"]);
}

#[test]
fn removing_a_root_makes_children_roots() {
    let store = seeded(&["root", "child"]);
    store.attach_child("root", "child").unwrap();

    store.remove("root").unwrap();

    assert_eq!(store.get_parent_id("child").unwrap(), None);
    assert_eq!(store.get("child").unwrap().parent_id, None);
}

#[test]
fn hierarchy_queries_need_live_snapshots() {
    let store = seeded(&["a"]);
    assert!(matches!(store.get_children("x"), Err(StoreError::NotFound(_))));
    assert!(matches!(store.attach_child("a", "x"), Err(StoreError::NotFound(_))));
    assert!(!store.is_descendant_of("a", "x").unwrap());
}
