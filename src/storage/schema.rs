use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError};

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed document store with a shared scope and per-user scopes.
///
/// Every document is keyed by `(scope, id)`. Writes never overwrite: a
/// second write to an existing key reports a conflict, which is what the
/// source registry and per-user copies rely on for deduplication.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// Pass `":memory:"` for a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked, `DatabaseError::Migration` if the schema could not
    /// be created, and `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout lets concurrent registrations queue on the write lock
        // instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Opened source database");
        Ok(db)
    }

    /// Close the pool. Later operations fail with a pool-closed error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // One table for both scopes. `cluster` is the scheme/www/slash
        // stripped form of `url`.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                scope TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                cluster TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                source_type TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (scope, id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // At most one canonical record per URL cluster in the shared scope.
        // This index is what arbitrates concurrent first registrations.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_shared_cluster ON documents(cluster) WHERE scope = 'shared'",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_scope_url ON documents(scope, url)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_scope_name ON documents(scope, name COLLATE NOCASE)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
