use std::sync::Mutex;

use event_emitter_rs::EventEmitter;
use serde_json::Value;

use super::{BusMessage, NotificationBus, PublishError};

/// Notification bus that re-emits messages to in-process listeners.
///
/// Listeners receive the [`BusMessage`] as a JSON string, keyed by event type.
/// The emitter runs listeners on their own threads, so delivery is asynchronous.
pub struct EmitterNotificationBus {
    emitter: Mutex<EventEmitter>,
}

impl Default for EmitterNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterNotificationBus {
    pub fn new() -> Self {
        Self {
            emitter: Mutex::new(EventEmitter::new()),
        }
    }

    pub fn with_emitter(emitter: EventEmitter) -> Self {
        Self {
            emitter: Mutex::new(emitter),
        }
    }

    /// Register a listener for one event type.
    pub fn on<F>(&self, event_type: &str, listener: F) -> Result<(), PublishError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut emitter = self.emitter.lock().map_err(|_| PublishError::Poisoned)?;
        emitter.on(event_type, listener);
        Ok(())
    }
}

impl NotificationBus for EmitterNotificationBus {
    fn publish(
        &self,
        event_type: &str,
        message: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let encoded = serde_json::to_string(&BusMessage::new(event_type, message, payload.clone()))
            .map_err(|e| PublishError::SerializationFailed(e.to_string()))?;
        let mut emitter = self.emitter.lock().map_err(|_| PublishError::Poisoned)?;
        emitter.emit(event_type, encoded);
        Ok(())
    }
}
