//! Core publisher trait for the notification bus.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message as it travels over the bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    pub event_type: String,
    pub message: String,
    pub payload: Value,
}

impl BusMessage {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
            payload,
        }
    }
}

/// Error type for publish operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Serialization of the message failed
    SerializationFailed(String),
    /// The bus rejected the message
    Rejected(String),
    /// The bus's internal state was poisoned
    Poisoned,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::SerializationFailed(msg) => write!(f, "Serialization failed: {}", msg),
            PublishError::Rejected(msg) => write!(f, "Message rejected: {}", msg),
            PublishError::Poisoned => write!(f, "Notification bus poisoned"),
        }
    }
}

impl std::error::Error for PublishError {}

/// One-way sink for externally relevant events.
///
/// Implementations might include:
/// - `InMemoryNotificationBus` - records messages for tests and polling hosts
/// - `EmitterNotificationBus` - re-emits to in-process listeners
/// - a bridge into the host's toast/banner system
pub trait NotificationBus: Send + Sync {
    fn publish(&self, event_type: &str, message: &str, payload: &Value)
        -> Result<(), PublishError>;
}
