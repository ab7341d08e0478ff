use std::error::Error;

use crate::error::StoreError;

use super::event::{BatchEvent, SnapshotEvent};

/// Outcome of a subscriber callback. Errors are routed to `on_error`.
pub type CallbackResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Receiver of store notifications.
///
/// All callbacks default to no-ops. A callback that returns an error (or
/// panics) is reported to that subscriber's `on_error` and does not stop
/// delivery to anyone else.
pub trait Subscriber: Send + Sync {
    /// Unique per store.
    fn id(&self) -> &str;

    fn on_snapshot_added(&self, _event: &SnapshotEvent) -> CallbackResult {
        Ok(())
    }

    fn on_snapshot_removed(&self, _event: &SnapshotEvent) -> CallbackResult {
        Ok(())
    }

    fn on_snapshot_updated(&self, _event: &SnapshotEvent) -> CallbackResult {
        Ok(())
    }

    fn on_batch(&self, _store_id: &str, _event: &BatchEvent) -> CallbackResult {
        Ok(())
    }

    fn on_error(&self, _error: &StoreError) {}
}

type EventCallback = Box<dyn Fn(&SnapshotEvent) -> CallbackResult + Send + Sync>;
type BatchCallback = Box<dyn Fn(&str, &BatchEvent) -> CallbackResult + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&StoreError) + Send + Sync>;

/// Closure-backed subscriber.
///
/// ```
/// use snapshot_store::FnSubscriber;
///
/// let subscriber = FnSubscriber::new("audit-log")
///     .on_updated(|event| {
///         println!("{} -> v{}", event.snapshot.id, event.snapshot.version);
///         Ok(())
///     })
///     .on_error(|err| eprintln!("audit-log: {}", err));
/// ```
pub struct FnSubscriber {
    id: String,
    added: Option<EventCallback>,
    removed: Option<EventCallback>,
    updated: Option<EventCallback>,
    batch: Option<BatchCallback>,
    error: Option<ErrorCallback>,
}

impl FnSubscriber {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            added: None,
            removed: None,
            updated: None,
            batch: None,
            error: None,
        }
    }

    pub fn on_added<F>(mut self, f: F) -> Self
    where
        F: Fn(&SnapshotEvent) -> CallbackResult + Send + Sync + 'static,
    {
        self.added = Some(Box::new(f));
        self
    }

    pub fn on_removed<F>(mut self, f: F) -> Self
    where
        F: Fn(&SnapshotEvent) -> CallbackResult + Send + Sync + 'static,
    {
        self.removed = Some(Box::new(f));
        self
    }

    pub fn on_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&SnapshotEvent) -> CallbackResult + Send + Sync + 'static,
    {
        self.updated = Some(Box::new(f));
        self
    }

    /// Receive every change kind through one callback.
    pub fn on_any<F>(self, f: F) -> Self
    where
        F: Fn(&SnapshotEvent) -> CallbackResult + Send + Sync + 'static,
    {
        let f = std::sync::Arc::new(f);
        let (a, r, u) = (f.clone(), f.clone(), f);
        self.on_added(move |e| (*a)(e))
            .on_removed(move |e| (*r)(e))
            .on_updated(move |e| (*u)(e))
    }

    pub fn on_batch<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &BatchEvent) -> CallbackResult + Send + Sync + 'static,
    {
        self.batch = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }
}

fn call(callback: &Option<EventCallback>, event: &SnapshotEvent) -> CallbackResult {
    match callback {
        Some(f) => f(event),
        None => Ok(()),
    }
}

impl Subscriber for FnSubscriber {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_snapshot_added(&self, event: &SnapshotEvent) -> CallbackResult {
        call(&self.added, event)
    }

    fn on_snapshot_removed(&self, event: &SnapshotEvent) -> CallbackResult {
        call(&self.removed, event)
    }

    fn on_snapshot_updated(&self, event: &SnapshotEvent) -> CallbackResult {
        call(&self.updated, event)
    }

    fn on_batch(&self, store_id: &str, event: &BatchEvent) -> CallbackResult {
        match &self.batch {
            Some(f) => f(store_id, event),
            None => Ok(()),
        }
    }

    fn on_error(&self, error: &StoreError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }
}
