mod documents;
mod schema;
mod scoped;
mod sessions;
mod types;

pub use schema::Database;
pub use scoped::ScopedStore;
pub use types::{
    DatabaseError, IssuedSession, PutOutcome, SessionToken, SourceDocument, SHARED_SCOPE,
    SOURCE_DOC_TYPE, WEB_SOURCE_TYPE,
};
