use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

use super::schema::Database;
use super::types::{DatabaseError, IssuedSession, SessionToken};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

impl Database {
    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Open a session granting access to `scope` for `ttl`.
    ///
    /// No credentials are checked here; callers decide who may hold a
    /// session for which scope.
    pub async fn open_session(
        &self,
        scope: &str,
        ttl: chrono::Duration,
    ) -> Result<IssuedSession, DatabaseError> {
        let token = new_token(scope);
        let expires_at = (chrono::Utc::now() + ttl).timestamp();

        sqlx::query("INSERT INTO sessions (token, scope, expires_at) VALUES (?, ?, ?)")
            .bind(token.expose())
            .bind(scope)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(scope = %scope, expires_at = expires_at, "Opened session");
        Ok(IssuedSession { token, expires_at })
    }

    /// Resolve a live session token to the scope it grants.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::UnknownSession`] for tokens never issued and
    /// [`DatabaseError::SessionExpired`] for tokens past their expiry.
    pub async fn scope_for_token(&self, token: &SessionToken) -> Result<String, DatabaseError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT scope, expires_at FROM sessions WHERE token = ?")
                .bind(token.expose())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            None => Err(DatabaseError::UnknownSession),
            Some((_, expires_at)) if expires_at <= chrono::Utc::now().timestamp() => {
                Err(DatabaseError::SessionExpired)
            }
            Some((scope, _)) => Ok(scope),
        }
    }

    /// Delete expired sessions, returning how many were removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Unguessable-enough token: SHA-256 over scope, wall clock, pid and a
/// process-wide counter.
fn new_token(scope: &str) -> SessionToken {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let input = format!("{scope}|{nanos}|{}|{counter}", std::process::id());
    SessionToken::new(format!("{:x}", Sha256::digest(input.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_resolves_to_scope() {
        let db = Database::open(":memory:").await.unwrap();
        let session = db
            .open_session("alice", chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(db.scope_for_token(&session.token).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let db = Database::open(":memory:").await.unwrap();
        let result = db.scope_for_token(&SessionToken::new("forged")).await;
        assert!(matches!(result, Err(DatabaseError::UnknownSession)));
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_purged() {
        let db = Database::open(":memory:").await.unwrap();
        let session = db
            .open_session("alice", chrono::Duration::seconds(-1))
            .await
            .unwrap();

        let result = db.scope_for_token(&session.token).await;
        assert!(matches!(result, Err(DatabaseError::SessionExpired)));
        assert_eq!(db.purge_expired_sessions().await.unwrap(), 1);
    }

    #[test]
    fn test_tokens_are_distinct_and_redacted() {
        let a = new_token("alice");
        let b = new_token("alice");
        assert_ne!(a.expose(), b.expose());
        assert!(!format!("{a:?}").contains(a.expose()));
    }
}
