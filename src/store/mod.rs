//! Persistence layer — conversation and user state behind a key-value store.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod records;
pub mod traits;

use std::path::Path;
use std::sync::Arc;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use records::{ConversationRecord, UserProfile};
pub use traits::{StateStore, Versioned};

use crate::error::StoreError;

/// Open the configured backend: a libSQL file when a path is given,
/// otherwise an in-memory store.
pub async fn open(path: Option<&Path>) -> Result<Arc<dyn StateStore>, StoreError> {
    match path {
        Some(path) => Ok(Arc::new(LibSqlStore::new_local(path).await?)),
        None => {
            tracing::warn!("STATE_DB_PATH not set; conversation state is kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
