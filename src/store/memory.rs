//! In-memory state store. State is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{StateStore, Versioned};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(String, String), Versioned>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn entry_key(namespace: &str, key: &str) -> (String, String) {
    (namespace.to_string(), key.to_string())
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Versioned>, StoreError> {
        Ok(self.entries.read().await.get(&entry_key(namespace, key)).cloned())
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        expected: u64,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let k = entry_key(namespace, key);
        let found = entries.get(&k).map_or(0, |e| e.etag);
        if found != expected {
            return Err(StoreError::Conflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
                expected,
                found,
            });
        }
        let etag = found + 1;
        entries.insert(
            k,
            Versioned {
                value: value.clone(),
                etag,
            },
        );
        Ok(etag)
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(&entry_key(namespace, key));
        Ok(())
    }
}
