use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use serde_json::json;
use tracing::warn;

use crate::bus::{NotificationBus, BATCH_FAILURE, SUBSCRIBER_ERROR};
use crate::error::StoreError;
use crate::snapshot::{Category, Snapshot};

use super::event::{BatchEvent, EventKind, Notification, SnapshotEvent};
use super::subscriber::{CallbackResult, Subscriber};

/// Which notifications a subscription receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionScope {
    pub store_id: String,
    /// Only snapshots in this category, when set.
    pub category: Option<Category>,
}

impl SubscriptionScope {
    pub fn store(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn matches(&self, store_id: &str, snapshot: Option<&Snapshot>) -> bool {
        if self.store_id != store_id {
            return false;
        }
        match (&self.category, snapshot) {
            (Some(filter), Some(snapshot)) => filter.index_key() == snapshot.category.index_key(),
            _ => true,
        }
    }
}

/// Returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    subscriber_id: String,
}

impl SubscriptionHandle {
    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }
}

struct Subscription {
    subscriber: Arc<dyn Subscriber>,
    scopes: Vec<SubscriptionScope>,
}

/// Holds subscribers and fans notifications out to them.
///
/// Notifications are queued and drained by one thread at a time, so every
/// subscriber sees them in enqueue order. A registry may be shared by several
/// stores; scopes pick the store.
pub struct SubscriberRegistry {
    subscriptions: RwLock<Vec<Subscription>>,
    pending: Mutex<VecDeque<Notification>>,
    dispatching: Mutex<()>,
    bus: Option<Arc<dyn NotificationBus>>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            dispatching: Mutex::new(()),
            bus: None,
        }
    }

    /// Forward failures to `bus`.
    pub fn with_bus(mut self, bus: Arc<dyn NotificationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Register `subscriber` for `scope`.
    ///
    /// A subscriber id may hold scopes on several stores but only one per store.
    pub fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber>,
        scope: SubscriptionScope,
    ) -> Result<SubscriptionHandle, StoreError> {
        let id = subscriber.id().to_string();
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| StoreError::LockPoisoned("subscribe"))?;

        match subscriptions
            .iter_mut()
            .find(|s| s.subscriber.id() == id)
        {
            Some(existing) => {
                if existing.scopes.iter().any(|s| s.store_id == scope.store_id) {
                    return Err(StoreError::DuplicateId(id));
                }
                existing.scopes.push(scope);
            }
            None => subscriptions.push(Subscription {
                subscriber,
                scopes: vec![scope],
            }),
        }

        Ok(SubscriptionHandle { subscriber_id: id })
    }

    /// Remove the subscriber from every scope. Returns false if it was unknown.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<bool, StoreError> {
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| StoreError::LockPoisoned("unsubscribe"))?;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.subscriber.id() != handle.subscriber_id);
        Ok(subscriptions.len() != before)
    }

    pub fn is_subscribed(&self, subscriber_id: &str) -> bool {
        self.subscriptions
            .read()
            .map(|subs| subs.iter().any(|s| s.subscriber.id() == subscriber_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every matching subscriber.
    pub fn notify(&self, event: SnapshotEvent) -> Result<(), StoreError> {
        self.enqueue(Notification::Snapshot(event))?;
        self.flush();
        Ok(())
    }

    /// Deliver a batch lifecycle event to the store's subscribers.
    pub fn notify_batch(&self, store_id: &str, event: BatchEvent) -> Result<(), StoreError> {
        self.enqueue(Notification::Batch {
            store_id: store_id.to_string(),
            event,
        })?;
        self.flush();
        Ok(())
    }

    /// Route a recovered failure to the store's subscribers' `on_error` and the bus.
    pub fn report_error(
        &self,
        store_id: &str,
        event_type: &'static str,
        error: StoreError,
    ) -> Result<(), StoreError> {
        self.enqueue(Notification::Error {
            store_id: store_id.to_string(),
            event_type,
            error,
        })?;
        self.flush();
        Ok(())
    }

    pub(crate) fn enqueue(&self, notification: Notification) -> Result<(), StoreError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| StoreError::LockPoisoned("notification queue"))?;
        pending.push_back(notification);
        Ok(())
    }

    /// Drain the queue unless another caller is already draining it.
    pub(crate) fn flush(&self) {
        loop {
            let guard = match self.dispatching.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            while let Some(notification) = self.pop() {
                self.deliver(&notification);
            }
            drop(guard);

            // Something may have been queued between the last pop and the unlock.
            if self.pending_is_empty() {
                return;
            }
        }
    }

    fn pop(&self) -> Option<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn pending_is_empty(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn targets(&self, store_id: &str, snapshot: Option<&Snapshot>) -> Vec<Arc<dyn Subscriber>> {
        let subscriptions = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions
            .iter()
            .filter(|s| s.scopes.iter().any(|scope| scope.matches(store_id, snapshot)))
            .map(|s| Arc::clone(&s.subscriber))
            .collect()
    }

    fn deliver(&self, notification: &Notification) {
        let store_id = notification.store_id();

        match notification {
            Notification::Snapshot(event) => {
                for subscriber in self.targets(store_id, Some(&event.snapshot)) {
                    self.invoke(store_id, subscriber.as_ref(), |s| match event.kind {
                        EventKind::Added => s.on_snapshot_added(event),
                        EventKind::Removed => s.on_snapshot_removed(event),
                        EventKind::Updated => s.on_snapshot_updated(event),
                    });
                }
            }
            Notification::Batch { event, .. } => {
                for subscriber in self.targets(store_id, None) {
                    self.invoke(store_id, subscriber.as_ref(), |s| s.on_batch(store_id, event));
                }
                if let BatchEvent::Failed {
                    operation,
                    failures,
                } = event
                {
                    let failed: Vec<_> = failures
                        .iter()
                        .map(|f| json!({"id": f.id, "reason": f.reason.to_string()}))
                        .collect();
                    self.forward(
                        BATCH_FAILURE,
                        &format!("batch {} had {} failed item(s)", operation.as_str(), failures.len()),
                        json!({"storeId": store_id, "operation": operation.as_str(), "failed": failed}),
                    );
                }
            }
            Notification::Error {
                event_type, error, ..
            } => {
                for subscriber in self.targets(store_id, None) {
                    report_to(subscriber.as_ref(), error);
                }
                self.forward(
                    event_type,
                    &error.to_string(),
                    json!({"storeId": store_id}),
                );
            }
        }
    }

    fn invoke<F>(&self, store_id: &str, subscriber: &dyn Subscriber, callback: F)
    where
        F: FnOnce(&dyn Subscriber) -> CallbackResult,
    {
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| callback(subscriber))) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        warn!(
            store_id = %store_id,
            subscriber_id = %subscriber.id(),
            reason = %reason,
            "Subscriber callback failed"
        );
        let error = StoreError::Subscriber {
            subscriber_id: subscriber.id().to_string(),
            reason,
        };
        report_to(subscriber, &error);
        self.forward(
            SUBSCRIBER_ERROR,
            &error.to_string(),
            json!({"storeId": store_id, "subscriberId": subscriber.id()}),
        );
    }

    fn forward(&self, event_type: &str, message: &str, payload: serde_json::Value) {
        if let Some(bus) = &self.bus {
            if let Err(err) = bus.publish(event_type, message, &payload) {
                warn!(event_type = %event_type, error = %err, "Notification bus publish failed");
            }
        }
    }
}

fn report_to(subscriber: &dyn Subscriber, error: &StoreError) {
    if panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_error(error))).is_err() {
        warn!(subscriber_id = %subscriber.id(), "Subscriber on_error panicked");
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "callback panicked".to_string()
    }
}
