use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{DatabaseError, PutOutcome, SourceDocument, SOURCE_DOC_TYPE, WEB_SOURCE_TYPE};

impl Database {
    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Fetch a document by its exact key.
    pub async fn get_document(
        &self,
        scope: &str,
        id: &str,
    ) -> Result<Option<SourceDocument>, DatabaseError> {
        let doc = sqlx::query_as::<_, SourceDocument>(
            "SELECT name, url, doc_type, source_type FROM documents WHERE scope = ? AND id = ?",
        )
        .bind(scope)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    /// Write a document unless its key is taken.
    ///
    /// Never overwrites. In the shared scope the URL cluster is unique as
    /// well, so a write for a variant of an already registered URL is also
    /// reported as [`PutOutcome::Conflict`].
    pub async fn put_document(
        &self,
        scope: &str,
        id: &str,
        cluster: &str,
        doc: &SourceDocument,
    ) -> Result<PutOutcome, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (scope, id, name, url, cluster, doc_type, source_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
        "#,
        )
        .bind(scope)
        .bind(id)
        .bind(&doc.name)
        .bind(&doc.url)
        .bind(cluster)
        .bind(&doc.doc_type)
        .bind(&doc.source_type)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(PutOutcome::Conflict)
        } else {
            Ok(PutOutcome::Created)
        }
    }

    /// Find web sources whose stored URL is any of `urls`, oldest first.
    pub async fn find_sources(
        &self,
        scope: &str,
        urls: &[String],
    ) -> Result<Vec<SourceDocument>, DatabaseError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT name, url, doc_type, source_type FROM documents WHERE scope = ",
        );
        builder.push_bind(scope);
        builder.push(" AND doc_type = ");
        builder.push_bind(SOURCE_DOC_TYPE);
        builder.push(" AND source_type = ");
        builder.push_bind(WEB_SOURCE_TYPE);
        builder.push(" AND url IN (");
        let mut separated = builder.separated(", ");
        for url in urls {
            separated.push_bind(url);
        }
        separated.push_unseparated(") ORDER BY created_at, id");

        let docs = builder
            .build_query_as::<SourceDocument>()
            .fetch_all(&self.pool)
            .await?;
        Ok(docs)
    }

    /// The document registered for a URL cluster, if any.
    pub async fn find_by_cluster(
        &self,
        scope: &str,
        cluster: &str,
    ) -> Result<Option<SourceDocument>, DatabaseError> {
        let doc = sqlx::query_as::<_, SourceDocument>(
            r#"
            SELECT name, url, doc_type, source_type FROM documents
            WHERE scope = ? AND cluster = ?
            ORDER BY created_at, id
            LIMIT 1
        "#,
        )
        .bind(scope)
        .bind(cluster)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    /// Page through sources whose name or URL starts with `keyword`.
    ///
    /// An empty keyword matches every source. `%`, `_` and `\` in the
    /// keyword are matched literally.
    pub async fn search_sources(
        &self,
        scope: &str,
        keyword: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SourceDocument>, DatabaseError> {
        let pattern = format!("{}%", escape_like(keyword));
        let docs = sqlx::query_as::<_, SourceDocument>(
            r#"
            SELECT name, url, doc_type, source_type FROM documents
            WHERE scope = ? AND doc_type = ?
              AND (name LIKE ? ESCAPE '\' OR url LIKE ? ESCAPE '\')
            ORDER BY name COLLATE NOCASE, id
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(scope)
        .bind(SOURCE_DOC_TYPE)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    /// Number of documents in a scope.
    pub async fn count_documents(&self, scope: &str) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE scope = ?")
            .bind(scope)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SHARED_SCOPE;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let db = test_db().await;
        let doc = SourceDocument::web("Example", "https://example.com/feed");

        let outcome = db
            .put_document("alice", &doc.url, "example.com/feed", &doc)
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Created);
        assert_eq!(
            db.get_document("alice", "https://example.com/feed").await.unwrap(),
            Some(doc)
        );
        assert_eq!(db.get_document("bob", "https://example.com/feed").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_same_key_conflicts_without_overwrite() {
        let db = test_db().await;
        let first = SourceDocument::web("First", "https://example.com/feed");
        let second = SourceDocument::web("Second", "https://example.com/feed");

        db.put_document("alice", &first.url, "c", &first).await.unwrap();
        let outcome = db.put_document("alice", &second.url, "c", &second).await.unwrap();

        assert_eq!(outcome, PutOutcome::Conflict);
        let stored = db.get_document("alice", &first.url).await.unwrap().unwrap();
        assert_eq!(stored.name, "First");
    }

    #[tokio::test]
    async fn test_shared_cluster_is_unique() {
        let db = test_db().await;
        let a = SourceDocument::web("A", "http://site.com");
        let b = SourceDocument::web("B", "https://www.site.com/");

        assert_eq!(
            db.put_document(SHARED_SCOPE, &a.url, "site.com", &a).await.unwrap(),
            PutOutcome::Created
        );
        assert_eq!(
            db.put_document(SHARED_SCOPE, &b.url, "site.com", &b).await.unwrap(),
            PutOutcome::Conflict
        );
        assert_eq!(
            db.find_by_cluster(SHARED_SCOPE, "site.com").await.unwrap(),
            Some(a)
        );
    }

    #[tokio::test]
    async fn test_user_scope_allows_cluster_variants() {
        let db = test_db().await;
        let a = SourceDocument::web("A", "http://site.com");
        let b = SourceDocument::web("B", "https://site.com");

        db.put_document("alice", &a.url, "site.com", &a).await.unwrap();
        let outcome = db.put_document("alice", &b.url, "site.com", &b).await.unwrap();
        assert_eq!(outcome, PutOutcome::Created);
        assert_eq!(db.count_documents("alice").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_sources_by_url_set() {
        let db = test_db().await;
        let doc = SourceDocument::web("Site", "https://www.site.com/");
        db.put_document(SHARED_SCOPE, &doc.url, "site.com", &doc).await.unwrap();

        let hits = db
            .find_sources(
                SHARED_SCOPE,
                &["http://site.com".to_owned(), "https://www.site.com/".to_owned()],
            )
            .await
            .unwrap();
        assert_eq!(hits, vec![doc]);

        let misses = db
            .find_sources(SHARED_SCOPE, &["https://other.com".to_owned()])
            .await
            .unwrap();
        assert!(misses.is_empty());
        assert!(db.find_sources(SHARED_SCOPE, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_by_prefix_with_paging() {
        let db = test_db().await;
        for (name, url, cluster) in [
            ("Rust Blog", "https://blog.rust-lang.org/feed.xml", "blog.rust-lang.org/feed.xml"),
            ("Rustacean Station", "https://rustacean-station.org/podcast.rss", "rustacean-station.org/podcast.rss"),
            ("Go Blog", "https://go.dev/blog/feed.atom", "go.dev/blog/feed.atom"),
        ] {
            let doc = SourceDocument::web(name, url);
            db.put_document(SHARED_SCOPE, url, cluster, &doc).await.unwrap();
        }

        let page = db.search_sources(SHARED_SCOPE, "rust", 1, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Rust Blog");

        let next = db.search_sources(SHARED_SCOPE, "rust", 1, 1).await.unwrap();
        assert_eq!(next[0].name, "Rustacean Station");

        let by_url = db.search_sources(SHARED_SCOPE, "https://go.dev", 10, 0).await.unwrap();
        assert_eq!(by_url.len(), 1);

        let all = db.search_sources(SHARED_SCOPE, "", 10, 0).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let db = test_db().await;
        let doc = SourceDocument::web("Plain", "https://plain.example.com");
        db.put_document(SHARED_SCOPE, &doc.url, "plain.example.com", &doc)
            .await
            .unwrap();

        assert!(db.search_sources(SHARED_SCOPE, "%", 10, 0).await.unwrap().is_empty());
        assert!(db.search_sources(SHARED_SCOPE, "_lain", 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_pool_reports_error() {
        let db = test_db().await;
        db.close().await;
        let doc = SourceDocument::web("X", "https://x.com");
        assert!(db.put_document("alice", &doc.url, "x.com", &doc).await.is_err());
    }
}
