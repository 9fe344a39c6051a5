//! SQLite pool backing the local replica
//!
//! The replica is a single `kv_entries` table whose values are replaced
//! whole on every write. The file runs in WAL mode with
//! `synchronous = NORMAL`: a crash may lose the last write but never
//! corrupts an earlier one. The schema version lives in
//! `PRAGMA user_version`, so migrations run once per file and a replica
//! written by a newer build is refused instead of being rewritten.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::CacheError;

/// Schema version this build writes
pub const SCHEMA_VERSION: i64 = 1;

/// Ordered migrations, each tagged with the version it produces
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/20241001_initial.sql"))];

/// Readers never block the single writer under WAL; a handful is plenty
const FILE_CONNECTIONS: u32 = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool over the replica database
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the replica file at `db_path` and migrates it
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or file cannot be
    /// opened, `CacheError::MigrationFailed` if the schema cannot be brought
    /// to [`SCHEMA_VERSION`].
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = Self::open(options, FILE_CONNECTIONS, &db_path.display().to_string()).await?;
        info!(path = %db_path.display(), schema = SCHEMA_VERSION, "Replica store opened");
        Ok(pool)
    }

    /// Opens a private in-memory replica
    ///
    /// Limited to one connection: every SQLite memory connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        Self::open(options, 1, ":memory:").await
    }

    /// The underlying sqlx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version recorded in the file
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        user_version(&self.pool).await
    }

    async fn open(
        options: SqliteConnectOptions,
        max_connections: u32,
        label: &str,
    ) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{}: {}", label, e)))?;

        migrate(&pool).await?;
        Ok(Self { pool })
    }
}

async fn user_version(pool: &SqlitePool) -> Result<i64, CacheError> {
    Ok(sqlx::query_scalar::<_, i64>("PRAGMA user_version")
        .fetch_one(pool)
        .await?)
}

/// Applies every migration newer than the file's `user_version`
async fn migrate(pool: &SqlitePool) -> Result<(), CacheError> {
    let current = user_version(pool).await?;
    if current > SCHEMA_VERSION {
        return Err(CacheError::MigrationFailed(format!(
            "replica schema v{} is newer than supported v{}",
            current, SCHEMA_VERSION
        )));
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let failed = |e: sqlx::Error| CacheError::MigrationFailed(format!("v{}: {}", version, e));

        let mut tx = pool.begin().await.map_err(failed)?;
        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(failed)?;
        let stamp = format!("PRAGMA user_version = {}", version);
        sqlx::query(&stamp).execute(&mut *tx).await.map_err(failed)?;
        tx.commit().await.map_err(failed)?;

        debug!(version, "Applied replica migration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_replica_is_at_current_version() {
        let pool = DatabasePool::in_memory().await.unwrap();
        assert_eq!(pool.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("replica.db");

        let pool = DatabasePool::new(&path).await.unwrap();
        sqlx::query("INSERT INTO kv_entries (key, value, updated_at) VALUES ('k', '1', 'now')")
            .execute(pool.pool())
            .await
            .unwrap();
        pool.pool().close().await;

        let pool = DatabasePool::new(&path).await.unwrap();
        assert_eq!(pool.schema_version().await.unwrap(), SCHEMA_VERSION);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_entries")
            .fetch_one(pool.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_newer_replica_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.db");

        let pool = DatabasePool::new(&path).await.unwrap();
        let bump = format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1);
        sqlx::query(&bump).execute(pool.pool()).await.unwrap();
        pool.pool().close().await;

        match DatabasePool::new(&path).await {
            Err(CacheError::MigrationFailed(message)) => assert!(message.contains("newer")),
            other => panic!("expected MigrationFailed, got {:?}", other.map(|_| ())),
        }
    }
}
