use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{BusMessage, NotificationBus, PublishError};

/// Notification bus that records every message.
///
/// Clone-friendly: clones share the same message log.
#[derive(Clone, Default)]
pub struct InMemoryNotificationBus {
    log: Arc<RwLock<Vec<BusMessage>>>,
}

impl InMemoryNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published messages, in order.
    pub fn messages(&self) -> Vec<BusMessage> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    /// Event types in publish order.
    pub fn event_types(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.event_type).collect()
    }

    pub fn find_all_by_type(&self, event_type: &str) -> Vec<BusMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.event_type == event_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.write() {
            log.clear();
        }
    }
}

impl NotificationBus for InMemoryNotificationBus {
    fn publish(
        &self,
        event_type: &str,
        message: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let mut log = self.log.write().map_err(|_| PublishError::Poisoned)?;
        log.push(BusMessage::new(event_type, message, payload.clone()));
        Ok(())
    }
}
