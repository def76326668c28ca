//! Cross-user deduplication of discovered sources.
//!
//! - [`normalize`] - the scheme/`www.`/slash variants that form one cluster
//! - [`session`] - explicit session cache for the shared scope
//! - [`source`] - the canonical registry itself

pub mod normalize;
pub mod session;
pub mod source;

pub use normalize::{candidate_keys, cluster_key};
pub use session::SessionCache;
pub use source::{RegistryError, SourcePage, SourceRegistry, ADMIN_PRINCIPAL, DEFAULT_SEARCH_PAGE_SIZE};
