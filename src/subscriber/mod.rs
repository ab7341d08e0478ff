//! Subscriber registry and change events.
//!
//! Every successful store mutation produces one [`SnapshotEvent`]. The store
//! enqueues it while still holding its write lock, so the queue order is the
//! commit order, then asks the registry to drain the queue after the lock is
//! released. Subscribers therefore may read from (or write to) the store from
//! inside a callback.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use snapshot_store::{FnSubscriber, NewSnapshot, SnapshotStore, SnapshotStoreConfig, SubscriptionScope};
//! use serde_json::json;
//!
//! let store = SnapshotStore::new(SnapshotStoreConfig::new("tasks"));
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! store
//!     .subscribe(
//!         Arc::new(FnSubscriber::new("ui").on_added(move |event| {
//!             sink.lock().unwrap().push(event.snapshot.id.clone());
//!             Ok(())
//!         })),
//!         SubscriptionScope::store("tasks"),
//!     )
//!     .unwrap();
//!
//! store.create(NewSnapshot::new("t1", json!({"title": "write docs"}))).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec!["t1"]);
//! ```

mod event;
mod registry;
#[allow(clippy::module_inception)]
mod subscriber;

pub use event::{BatchEvent, BatchOperation, EventKind, SnapshotEvent};
pub(crate) use event::Notification;
pub(crate) use registry::panic_message;
pub use registry::{SubscriberRegistry, SubscriptionHandle, SubscriptionScope};
pub use subscriber::{CallbackResult, FnSubscriber, Subscriber};
