use serde_json::Value;

use crate::snapshot::Snapshot;

use super::source::{DataSource, SourceError};

/// Host HTTP client, reduced to the two calls the store needs.
pub trait RemoteApiClient: Send + Sync {
    fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, SourceError>;

    fn post(&self, path: &str, body: &Value) -> Result<Value, SourceError>;
}

/// Data source backed by a [`RemoteApiClient`].
///
/// Paths: `GET {base}/stores/{store}/snapshots/{id}`,
/// `POST {base}/stores/{store}/snapshots`, `GET {base}/health`.
pub struct RemoteDataSource<C> {
    name: String,
    base_path: String,
    client: C,
}

impl<C: RemoteApiClient> RemoteDataSource<C> {
    pub fn new(name: impl Into<String>, client: C) -> Self {
        Self {
            name: name.into(),
            base_path: String::new(),
            client,
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: RemoteApiClient> DataSource for RemoteDataSource<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, store_id: &str, id: &str) -> Result<Value, SourceError> {
        let path = format!("{}/stores/{}/snapshots/{}", self.base_path, store_id, id);
        self.client.get(&path, &[])
    }

    fn push(&self, store_id: &str, snapshot: &Snapshot) -> Result<(), SourceError> {
        let path = format!("{}/stores/{}/snapshots", self.base_path, store_id);
        let body =
            serde_json::to_value(snapshot).map_err(|e| SourceError::Malformed(e.to_string()))?;
        self.client.post(&path, &body)?;
        Ok(())
    }

    fn health_check(&self) -> Result<(), SourceError> {
        self.client
            .get(&format!("{}/health", self.base_path), &[])
            .map(|_| ())
    }
}
