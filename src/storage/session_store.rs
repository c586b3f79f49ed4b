use super::{Storage, StorageKey};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Typed view over a backend for the four session keys.
///
/// Writes never fail from the caller's point of view: a backend error is
/// logged and the persisted copy is simply left as it was.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self { backend }
    }

    pub async fn get(&self, key: StorageKey) -> Option<String> {
        self.backend.get(key.as_str()).await
    }

    pub async fn set(&self, key: StorageKey, value: &str) {
        if let Err(e) = self.backend.set(key.as_str(), value).await {
            tracing::warn!(key = key.as_str(), error = %e, "persist failed, keeping in-memory value only");
        }
    }

    pub async fn remove(&self, key: StorageKey) {
        if let Err(e) = self.backend.remove(key.as_str()).await {
            tracing::warn!(key = key.as_str(), error = %e, "remove failed");
        }
    }

    /// Empty string for a missing key
    pub async fn token(&self, key: StorageKey) -> String {
        self.get(key).await.unwrap_or_default()
    }

    /// Stored user object, `{}` when missing or malformed
    pub async fn user(&self) -> Map<String, Value> {
        let Some(raw) = self.get(StorageKey::User).await else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!("stored user is not a JSON object, ignoring");
                Map::new()
            }
        }
    }

    /// Stored permission codes, empty when missing or malformed
    pub async fn perms(&self) -> BTreeSet<String> {
        let Some(raw) = self.get(StorageKey::Perms).await else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(codes) => codes.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "stored perms are malformed, ignoring");
                BTreeSet::new()
            }
        }
    }

    pub async fn set_user(&self, user: &Map<String, Value>) {
        // a Map of Values always serializes
        let raw = Value::Object(user.clone()).to_string();
        self.set(StorageKey::User, &raw).await;
    }

    pub async fn set_perms(&self, perms: &BTreeSet<String>) {
        let raw = Value::from(perms.iter().cloned().collect::<Vec<String>>()).to_string();
        self.set(StorageKey::Perms, &raw).await;
    }

    /// Drop every session key
    pub async fn clear(&self) {
        for key in StorageKey::ALL {
            self.remove(key).await;
        }
    }
}
