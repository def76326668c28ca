use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use super::normalize::{candidate_keys, cluster_key};
use super::session::SessionCache;
use crate::storage::{Database, DatabaseError, PutOutcome, ScopedStore, SourceDocument, SHARED_SCOPE};

/// Principal that owns the shared scope.
pub const ADMIN_PRINCIPAL: &str = "admin";

/// Default number of sources per search page.
pub const DEFAULT_SEARCH_PAGE_SIZE: i64 = 25;

/// Errors from the shared source registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A session for the shared scope could not be obtained
    #[error("shared store session failed: {0}")]
    Session(#[source] DatabaseError),
    /// Reading the shared store failed
    #[error("source lookup failed: {0}")]
    Lookup(#[source] DatabaseError),
    /// Writing a canonical record failed for a reason other than a conflict
    #[error("Unable to add the url")]
    WriteFailure(#[source] DatabaseError),
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SourcePage {
    pub docs: Vec<SourceDocument>,
    /// Offset to request the following page with
    pub next_offset: i64,
}

/// Cross-user canonical store: one record per normalized-URL cluster.
///
/// Lookups match any of the eight scheme/`www.`/slash spellings of a URL.
/// Writes are keyed by the exact URL and never overwrite; a conflicting
/// write means someone else registered the site first, and their record
/// is the canonical one.
#[derive(Clone)]
pub struct SourceRegistry {
    db: Database,
    sessions: Arc<SessionCache>,
    page_size: i64,
}

impl SourceRegistry {
    pub fn new(db: Database, sessions: Arc<SessionCache>) -> Self {
        Self {
            db,
            sessions,
            page_size: DEFAULT_SEARCH_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The canonical record registered for any spelling of `url`.
    pub async fn find_canonical(&self, url: &str) -> Result<Option<SourceDocument>, RegistryError> {
        let keys: Vec<String> = candidate_keys(url).into_iter().collect();
        let store = self.shared_store().await?;
        let found = store.find_sources(&keys).await.map_err(RegistryError::Lookup)?;
        Ok(found.into_iter().next())
    }

    /// Register `doc` unless its cluster already has a canonical record.
    ///
    /// Returns the record the store now holds for the cluster: `doc` itself
    /// when this call created it, otherwise the earlier registration. A
    /// conflict is the normal outcome of a lost registration race and is
    /// not an error.
    ///
    /// # Errors
    ///
    /// [`RegistryError::WriteFailure`] for any write failure other than a conflict.
    pub async fn register_if_absent(
        &self,
        doc: &SourceDocument,
    ) -> Result<SourceDocument, RegistryError> {
        let cluster = cluster_key(&doc.url);
        let store = self.shared_store().await?;

        let outcome = store.put(&doc.url, &cluster, doc).await.map_err(|e| {
            tracing::error!(url = %doc.url, error = %e, "Unexpected error writing canonical source");
            RegistryError::WriteFailure(e)
        })?;

        match outcome {
            PutOutcome::Created => {
                tracing::debug!(url = %doc.url, "Registered canonical source");
                Ok(doc.clone())
            }
            PutOutcome::Conflict => {
                let existing = store
                    .find_by_cluster(&cluster)
                    .await
                    .map_err(RegistryError::Lookup)?;
                tracing::debug!(
                    url = %doc.url,
                    canonical = existing.as_ref().map(|d| d.url.as_str()).unwrap_or_default(),
                    "Source already registered"
                );
                Ok(existing.unwrap_or_else(|| doc.clone()))
            }
        }
    }

    /// Canonical sources whose name or URL starts with `keyword`.
    pub async fn search(&self, keyword: &str, offset: i64) -> Result<SourcePage, RegistryError> {
        let offset = offset.max(0);
        let store = self.shared_store().await?;
        let docs = store
            .search(keyword.trim(), self.page_size, offset)
            .await
            .map_err(RegistryError::Lookup)?;
        Ok(SourcePage {
            docs,
            next_offset: offset + self.page_size,
        })
    }

    /// Number of canonical records.
    pub async fn canonical_count(&self) -> Result<i64, RegistryError> {
        let store = self.shared_store().await?;
        store.count().await.map_err(RegistryError::Lookup)
    }

    /// The shared scope, through a session refreshed on demand.
    async fn shared_store(&self) -> Result<ScopedStore, RegistryError> {
        let token = self
            .sessions
            .token_for(&self.db, ADMIN_PRINCIPAL, SHARED_SCOPE)
            .await
            .map_err(RegistryError::Session)?;

        match self.db.scoped(&token).await {
            Ok(store) => Ok(store),
            Err(DatabaseError::SessionExpired | DatabaseError::UnknownSession) => {
                // Store-side expiry ahead of ours (e.g. sessions purged)
                self.sessions.invalidate(ADMIN_PRINCIPAL);
                let token = self
                    .sessions
                    .token_for(&self.db, ADMIN_PRINCIPAL, SHARED_SCOPE)
                    .await
                    .map_err(RegistryError::Session)?;
                self.db.scoped(&token).await.map_err(RegistryError::Session)
            }
            Err(e) => Err(RegistryError::Session(e)),
        }
    }
}
