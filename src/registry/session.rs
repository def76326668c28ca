use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::{Database, DatabaseError, SessionToken};

/// Seconds before expiry at which a cached token is already refreshed, so a
/// token handed out never lapses mid-operation.
const REFRESH_MARGIN_SECS: i64 = 10;

#[derive(Clone)]
struct CachedSession {
    token: SessionToken,
    expires_at: i64,
}

/// Explicit per-principal session cache.
///
/// Holds `{token, expires_at}` for each principal. Callers ask for a token
/// before every privileged store operation; a missing or nearly expired
/// entry is refreshed by opening a new session.
pub struct SessionCache {
    ttl: chrono::Duration,
    entries: Mutex<HashMap<String, CachedSession>>,
}

impl SessionCache {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// A live token for `principal`, granting `scope`.
    pub async fn token_for(
        &self,
        db: &Database,
        principal: &str,
        scope: &str,
    ) -> Result<SessionToken, DatabaseError> {
        if let Some(token) = self.cached(principal) {
            return Ok(token);
        }

        tracing::debug!(principal = %principal, "Session missing or expired, refreshing");
        let issued = db.open_session(scope, self.ttl).await?;
        let token = issued.token.clone();
        self.lock().insert(
            principal.to_owned(),
            CachedSession {
                token: issued.token,
                expires_at: issued.expires_at,
            },
        );
        Ok(token)
    }

    /// Drop the cached entry, forcing a refresh on next use.
    pub fn invalidate(&self, principal: &str) {
        self.lock().remove(principal);
    }

    fn cached(&self, principal: &str) -> Option<SessionToken> {
        let now = chrono::Utc::now().timestamp();
        self.lock()
            .get(principal)
            .filter(|entry| entry.expires_at - REFRESH_MARGIN_SECS > now)
            .map(|entry| entry.token.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedSession>> {
        // A poisoned map only ever holds complete entries
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_is_reused_while_live() {
        let db = Database::open(":memory:").await.unwrap();
        let cache = SessionCache::new(chrono::Duration::minutes(5));

        let first = cache.token_for(&db, "admin", "shared").await.unwrap();
        let second = cache.token_for(&db, "admin", "shared").await.unwrap();
        assert_eq!(first.expose(), second.expose());
        assert_eq!(db.scope_for_token(&first).await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let db = Database::open(":memory:").await.unwrap();
        // Entries shorter than the refresh margin are never reused
        let cache = SessionCache::new(chrono::Duration::seconds(1));

        let first = cache.token_for(&db, "admin", "shared").await.unwrap();
        let second = cache.token_for(&db, "admin", "shared").await.unwrap();
        assert_ne!(first.expose(), second.expose());
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_session() {
        let db = Database::open(":memory:").await.unwrap();
        let cache = SessionCache::new(chrono::Duration::minutes(5));

        let first = cache.token_for(&db, "admin", "shared").await.unwrap();
        cache.invalidate("admin");
        let second = cache.token_for(&db, "admin", "shared").await.unwrap();
        assert_ne!(first.expose(), second.expose());
    }

    #[tokio::test]
    async fn test_principals_are_independent() {
        let db = Database::open(":memory:").await.unwrap();
        let cache = SessionCache::new(chrono::Duration::minutes(5));

        let admin = cache.token_for(&db, "admin", "shared").await.unwrap();
        let alice = cache.token_for(&db, "alice", "alice").await.unwrap();
        assert_ne!(admin.expose(), alice.expose());
        assert_eq!(db.scope_for_token(&alice).await.unwrap(), "alice");
    }
}
