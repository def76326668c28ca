use super::schema::Database;
use super::types::{DatabaseError, PutOutcome, SessionToken, SourceDocument};

/// A view of the document store limited to one scope.
///
/// Obtained from a session token, so every operation through it has been
/// authorized by a live session.
#[derive(Clone)]
pub struct ScopedStore {
    db: Database,
    scope: String,
}

impl Database {
    /// Open the scope granted by `token`.
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::UnknownSession`] or
    /// [`DatabaseError::SessionExpired`] when the token is not live.
    pub async fn scoped(&self, token: &SessionToken) -> Result<ScopedStore, DatabaseError> {
        let scope = self.scope_for_token(token).await?;
        Ok(ScopedStore {
            db: self.clone(),
            scope,
        })
    }
}

impl ScopedStore {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn get(&self, id: &str) -> Result<Option<SourceDocument>, DatabaseError> {
        self.db.get_document(&self.scope, id).await
    }

    pub async fn put(
        &self,
        id: &str,
        cluster: &str,
        doc: &SourceDocument,
    ) -> Result<PutOutcome, DatabaseError> {
        self.db.put_document(&self.scope, id, cluster, doc).await
    }

    pub async fn find_sources(&self, urls: &[String]) -> Result<Vec<SourceDocument>, DatabaseError> {
        self.db.find_sources(&self.scope, urls).await
    }

    pub async fn find_by_cluster(
        &self,
        cluster: &str,
    ) -> Result<Option<SourceDocument>, DatabaseError> {
        self.db.find_by_cluster(&self.scope, cluster).await
    }

    pub async fn search(
        &self,
        keyword: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SourceDocument>, DatabaseError> {
        self.db.search_sources(&self.scope, keyword, limit, offset).await
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        self.db.count_documents(&self.scope).await
    }
}
