//! SQLite implementation of ILocalStore
//!
//! One row per key in `kv_entries`. Each write records the wall-clock time
//! of the write in `updated_at`, which is informational only: conflict
//! resolution never reads it.

use sqlx::{Row, SqlitePool};

use fleetsync_core::domain::Timestamp;
use fleetsync_core::ports::ILocalStore;

use crate::CacheError;

/// A stored entry with its write time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub key: String,
    pub bytes: usize,
    pub updated_at: String,
}

/// SQLite-backed local key-value store
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Creates a store over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads a value
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Inserts or replaces a value
    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let now = Timestamp::now().to_iso_string();
        sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::trace!(key, bytes = value.len(), "Stored entry");
        Ok(())
    }

    /// Lists every entry ordered by key, without values
    pub async fn entries(&self) -> Result<Vec<StoreEntry>, CacheError> {
        let rows = sqlx::query(
            "SELECT key, LENGTH(CAST(value AS BLOB)) AS bytes, updated_at FROM kv_entries ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoreEntry {
                key: row.get("key"),
                bytes: row.get::<i64, _>("bytes").max(0) as usize,
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl ILocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get_value(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        Ok(self.set_value(key, value).await?)
    }
}
