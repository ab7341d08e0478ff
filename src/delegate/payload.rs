use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// A remote store listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDescriptor {
    pub store_id: String,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

/// A data-source response, classified once when it enters the store.
#[derive(Clone, Debug, PartialEq)]
pub enum StorePayload {
    Snapshot(Box<Snapshot>),
    Store(StoreDescriptor),
    RawResponse(Value),
}

impl StorePayload {
    /// Classify a response by shape; anything unrecognized stays raw.
    pub fn from_response(response: Value) -> Self {
        let Some(object) = response.as_object() else {
            return StorePayload::RawResponse(response);
        };

        if object.contains_key("storeId") && object.contains_key("snapshots") {
            if let Ok(descriptor) = serde_json::from_value::<StoreDescriptor>(response.clone()) {
                return StorePayload::Store(descriptor);
            }
        }
        if object.contains_key("versionId") && object.contains_key("payload") {
            if let Ok(snapshot) = serde_json::from_value::<Snapshot>(response.clone()) {
                return StorePayload::Snapshot(Box::new(snapshot));
            }
        }
        StorePayload::RawResponse(response)
    }

    /// Payload for snapshot `id`.
    pub fn into_payload(self, id: &str) -> Result<Value, StoreError> {
        match self {
            StorePayload::Snapshot(snapshot) => Ok(snapshot.payload),
            StorePayload::Store(descriptor) => descriptor
                .snapshots
                .into_iter()
                .find(|s| s.id == id)
                .map(|s| s.payload)
                .ok_or_else(|| StoreError::NotFound(id.to_string())),
            StorePayload::RawResponse(value) => Ok(value),
        }
    }
}
