use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};

use crate::snapshot::Snapshot;

use super::source::{DataSource, SourceError};

/// Stand-in data source used when the real one is disabled or unavailable.
///
/// Serves seeded responses, or a generated placeholder for unseeded ids, and
/// records pushed snapshots. Clone-friendly.
#[derive(Clone, Default)]
pub struct SimulatedDataSource {
    responses: Arc<RwLock<HashMap<String, Value>>>,
    pushed: Arc<RwLock<Vec<Snapshot>>>,
}

impl SimulatedDataSource {
    pub const NAME: &'static str = "simulated";

    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the response returned for `id` in `store_id`.
    pub fn with_response(self, store_id: &str, id: &str, response: Value) -> Self {
        if let Ok(mut responses) = self.responses.write() {
            responses.insert(Self::key(store_id, id), response);
        }
        self
    }

    pub fn pushed(&self) -> Vec<Snapshot> {
        self.pushed.read().map(|p| p.clone()).unwrap_or_default()
    }

    fn key(store_id: &str, id: &str) -> String {
        format!("{}:{}", store_id, id)
    }
}

impl DataSource for SimulatedDataSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch(&self, store_id: &str, id: &str) -> Result<Value, SourceError> {
        let responses = self
            .responses
            .read()
            .map_err(|_| SourceError::Unavailable("simulated source poisoned".into()))?;
        Ok(responses
            .get(&Self::key(store_id, id))
            .cloned()
            .unwrap_or_else(|| json!({"id": id, "storeId": store_id, "simulated": true})))
    }

    fn push(&self, _store_id: &str, snapshot: &Snapshot) -> Result<(), SourceError> {
        let mut pushed = self
            .pushed
            .write()
            .map_err(|_| SourceError::Unavailable("simulated source poisoned".into()))?;
        pushed.push(snapshot.clone());
        Ok(())
    }
}
