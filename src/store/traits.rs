//! `StateStore` — async key-value interface with optimistic concurrency, plus
//! typed access to conversation records and user profiles built on it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::records::{ConversationRecord, UserProfile, CONVERSATIONS, PROFILES};
use crate::error::StoreError;

/// A stored value and its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub value: Value,
    pub etag: u64,
}

/// Backend-agnostic state store.
///
/// Backends implement the three key-value primitives; the typed record
/// methods are provided on top of them.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read one entry.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Versioned>, StoreError>;

    /// Write one entry if its stored etag still equals `expected` (`0` = must
    /// not exist yet). Returns the new etag.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        expected: u64,
    ) -> Result<u64, StoreError>;

    /// Remove one entry. Missing entries are not an error.
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;

    async fn load_conversation(&self, id: &str) -> Result<ConversationRecord, StoreError> {
        let mut record = load_as(self, CONVERSATIONS, id)
            .await?
            .map(|(mut record, etag): (ConversationRecord, u64)| {
                record.etag = etag;
                record
            })
            .unwrap_or_else(|| ConversationRecord::new(id));
        record.conversation_id = id.to_string();
        Ok(record)
    }

    async fn save_conversation(&self, record: &mut ConversationRecord) -> Result<(), StoreError> {
        record.etag = save_as(self, CONVERSATIONS, &record.conversation_id, &*record, record.etag).await?;
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        self.delete(CONVERSATIONS, id).await
    }

    async fn load_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let mut profile = load_as(self, PROFILES, user_id)
            .await?
            .map(|(mut profile, etag): (UserProfile, u64)| {
                profile.etag = etag;
                profile
            })
            .unwrap_or_else(|| UserProfile::new(user_id));
        profile.user_id = user_id.to_string();
        Ok(profile)
    }

    async fn save_profile(&self, profile: &mut UserProfile) -> Result<(), StoreError> {
        profile.etag = save_as(self, PROFILES, &profile.user_id, &*profile, profile.etag).await?;
        Ok(())
    }
}

async fn load_as<S, T>(store: &S, namespace: &str, key: &str) -> Result<Option<(T, u64)>, StoreError>
where
    S: StateStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(entry) = store.get(namespace, key).await? else {
        return Ok(None);
    };
    let value = serde_json::from_value(entry.value)
        .map_err(|e| StoreError::Serialization(format!("{namespace}/{key}: {e}")))?;
    Ok(Some((value, entry.etag)))
}

async fn save_as<S, T>(
    store: &S,
    namespace: &str,
    key: &str,
    value: &T,
    expected: u64,
) -> Result<u64, StoreError>
where
    S: StateStore + ?Sized,
    T: Serialize + Sync,
{
    let value = serde_json::to_value(value)
        .map_err(|e| StoreError::Serialization(format!("{namespace}/{key}: {e}")))?;
    store.put(namespace, key, &value, expected).await
}
