//! libSQL backend — `StateStore` over a single `kv_state` table.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::{debug, info};

use super::migrations;
use super::traits::{StateStore, Versioned};
use crate::error::StoreError;

/// libSQL state store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "State database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn current_etag(&self, namespace: &str, key: &str) -> Result<u64, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT etag FROM kv_state WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("current_etag: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map(to_etag).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(StoreError::Query(format!("current_etag: {e}"))),
        }
    }
}

fn to_etag(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn to_sql(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[async_trait]
impl StateStore for LibSqlStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Versioned>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value, etag FROM kv_state WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get row parse: {e}")))?;
                let etag: i64 = row
                    .get(1)
                    .map_err(|e| StoreError::Query(format!("get row parse: {e}")))?;
                let value = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Serialization(format!("{namespace}/{key}: {e}")))?;
                Ok(Some(Versioned {
                    value,
                    etag: to_etag(etag),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get: {e}"))),
        }
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        expected: u64,
    ) -> Result<u64, StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::Serialization(format!("{namespace}/{key}: {e}")))?;
        let now = Utc::now().to_rfc3339();

        // The etag check is part of the write so concurrent writers cannot both win.
        let changed = if expected == 0 {
            self.conn
                .execute(
                    "INSERT INTO kv_state (namespace, key, value, etag, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4)
                     ON CONFLICT(namespace, key) DO NOTHING",
                    params![namespace, key, raw, now],
                )
                .await
        } else {
            self.conn
                .execute(
                    "UPDATE kv_state SET value = ?3, etag = etag + 1, updated_at = ?4
                     WHERE namespace = ?1 AND key = ?2 AND etag = ?5",
                    params![namespace, key, raw, now, to_sql(expected)],
                )
                .await
        }
        .map_err(|e| StoreError::Query(format!("put: {e}")))?;

        if changed == 0 {
            return Err(StoreError::Conflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
                expected,
                found: self.current_etag(namespace, key).await?,
            });
        }

        let etag = expected + 1;
        debug!(namespace, key, etag, "State saved");
        Ok(etag)
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "DELETE FROM kv_state WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("delete: {e}")))?;
        Ok(())
    }
}
