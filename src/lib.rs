//! Turns an arbitrary web page URL into a syndication feed and registers it
//! once per site, shared across users.

pub mod config;
pub mod feed;
pub mod ingest;
pub mod registry;
pub mod storage;
pub mod util;

pub use ingest::{AddedSource, IngestError, IngestionCoordinator, StoreFailure};
