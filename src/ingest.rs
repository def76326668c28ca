//! The single externally visible operation: add a page URL for a user.
//!
//! Ties discovery, canonical dedup and the per-user write together. The
//! canonical write and the per-user write are independent; a failure
//! between them leaves a canonical record without a user copy, and a retry
//! finds that record and completes the user write.

use serde::Serialize;
use thiserror::Error;

use crate::feed::{DiscoveryError, FeedDiscoveryEngine};
use crate::registry::{cluster_key, RegistryError, SourceRegistry};
use crate::storage::{Database, DatabaseError, PutOutcome, SessionToken, SourceDocument};
use crate::util::{validate_url, UrlValidationError};

/// What the caller gets back from a successful add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedSource {
    pub name: String,
    /// The canonical URL, possibly adopted from an earlier registration
    pub url: String,
}

/// Every way `add_url` can fail. Display strings are the caller-facing
/// failure payloads.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{url} is not a proper feed: {source}")]
    Rejected {
        url: String,
        #[source]
        source: UrlValidationError,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The user already holds this exact URL
    #[error("URL already exist")]
    UserConflict,

    #[error("Unable to add the url")]
    WriteFailure(#[source] StoreFailure),

    #[error("Invalid session: {0}")]
    InvalidSession(#[source] DatabaseError),
}

/// The underlying cause of an [`IngestError::WriteFailure`].
#[derive(Debug, Error)]
pub enum StoreFailure {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<RegistryError> for IngestError {
    fn from(err: RegistryError) -> Self {
        IngestError::WriteFailure(err.into())
    }
}

/// Coordinates one `add_url` call from submitted URL to stored records.
#[derive(Clone)]
pub struct IngestionCoordinator {
    engine: FeedDiscoveryEngine,
    registry: SourceRegistry,
    db: Database,
    allow_private_hosts: bool,
}

impl IngestionCoordinator {
    pub fn new(engine: FeedDiscoveryEngine, registry: SourceRegistry, db: Database) -> Self {
        Self {
            engine,
            registry,
            db,
            allow_private_hosts: false,
        }
    }

    /// Permit localhost and private-network targets.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Discover the feed behind `url`, register it once across all users and
    /// record it for the user holding `token`.
    ///
    /// If an equivalent URL (scheme, `www.` or trailing slash variant) was
    /// registered before, the existing canonical URL is returned instead of
    /// the freshly discovered one.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Rejected`] for unsupported or internal URLs
    /// - [`IngestError::InvalidSession`] when `token` is not a live session
    /// - [`IngestError::Discovery`] when no feed could be located
    /// - [`IngestError::UserConflict`] when the user already added this URL
    /// - [`IngestError::WriteFailure`] for any other store failure
    pub async fn add_url(&self, url: &str, token: &SessionToken) -> Result<AddedSource, IngestError> {
        let url = url.trim();
        validate_url(url, self.allow_private_hosts).map_err(|source| IngestError::Rejected {
            url: url.to_string(),
            source,
        })?;

        let user_store = self
            .db
            .scoped(token)
            .await
            .map_err(IngestError::InvalidSession)?;

        let feed = self.engine.discover(url).await?;
        tracing::debug!(url = %url, feed = %feed.url, strategy = %feed.strategy, "Feed discovered");

        let mut doc = SourceDocument::web(feed.title, feed.url);

        if let Some(existing) = self.registry.find_canonical(&doc.url).await? {
            tracing::debug!(discovered = %doc.url, canonical = %existing.url, "Adopting existing canonical URL");
            doc.url = existing.url;
        }

        let canonical = self.registry.register_if_absent(&doc).await?;
        if canonical.url != doc.url {
            tracing::debug!(discovered = %doc.url, canonical = %canonical.url, "Lost registration race, adopting winner");
            doc.url = canonical.url;
        }

        let cluster = cluster_key(&doc.url);
        match user_store.put(url, &cluster, &doc).await {
            Ok(PutOutcome::Created) => {
                tracing::info!(scope = %user_store.scope(), url = %doc.url, "Source added");
                Ok(AddedSource {
                    name: doc.name,
                    url: doc.url,
                })
            }
            Ok(PutOutcome::Conflict) => Err(IngestError::UserConflict),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Failed to write user source");
                Err(IngestError::WriteFailure(e.into()))
            }
        }
    }
}
