//! Notification bus - a one-way sink for externally relevant store events.
//!
//! The subscriber registry forwards failures (subscriber callbacks, persistence,
//! batch items) to an optional [`NotificationBus`]. The host decides what to do
//! with them (toasts, banners, telemetry); the store never reads the bus back.
//!
//! ```
//! use snapshot_store::bus::{InMemoryNotificationBus, NotificationBus};
//! use serde_json::json;
//!
//! let bus = InMemoryNotificationBus::new();
//! bus.publish("PERSISTENCE_ERROR", "disk full", &json!({"storeId": "tasks"})).unwrap();
//! assert_eq!(bus.event_types(), vec!["PERSISTENCE_ERROR"]);
//! ```

#[cfg(feature = "emitter")]
mod emitter;
mod in_memory;
mod publisher;

#[cfg(feature = "emitter")]
pub use emitter::EmitterNotificationBus;
pub use in_memory::InMemoryNotificationBus;
pub use publisher::{BusMessage, NotificationBus, PublishError};

/// A subscriber callback failed.
pub const SUBSCRIBER_ERROR: &str = "SUBSCRIBER_ERROR";
/// The persistence adapter rejected a read, write or delete.
pub const PERSISTENCE_ERROR: &str = "PERSISTENCE_ERROR";
/// The data source could not be reached, even after falling back.
pub const ANALYZE_DATA_ERROR: &str = "ANALYZE_DATA_ERROR";
/// At least one item of a batch failed.
pub const BATCH_FAILURE: &str = "BATCH_FAILURE";
