use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The source database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// The session token was never issued
    #[error("Unknown session")]
    UnknownSession,

    /// The session token has passed its expiry
    #[error("Session expired")]
    SessionExpired,

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Documents
// ============================================================================

/// Scope holding the canonical, cross-user source records.
pub const SHARED_SCOPE: &str = "shared";

/// Document type of every record this crate writes.
pub const SOURCE_DOC_TYPE: &str = "source";
/// Source type of feeds discovered from web pages.
pub const WEB_SOURCE_TYPE: &str = "web";

/// A feed source as stored in either scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub name: String,
    pub url: String,
    pub doc_type: String,
    pub source_type: String,
}

impl SourceDocument {
    /// A `source`/`web` document, the only kind discovery produces.
    pub fn web(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            doc_type: SOURCE_DOC_TYPE.to_owned(),
            source_type: WEB_SOURCE_TYPE.to_owned(),
        }
    }
}

/// Outcome of a key-unique write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    /// A document with the same key (or, in the shared scope, the same
    /// URL cluster) already exists; nothing was written
    Conflict,
}

// ============================================================================
// Sessions
// ============================================================================

/// Opaque session token. Never printed by `Debug`.
pub struct SessionToken(SecretString);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SessionToken {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// A freshly opened session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    /// Unix seconds after which the token is rejected
    pub expires_at: i64,
}
