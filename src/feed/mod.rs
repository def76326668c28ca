//! Feed discovery: from an arbitrary page URL to a parsed feed.
//!
//! - [`parser`] - feed body parsing using the `feed-rs` crate
//! - [`fetcher`] - timed HTTP fetch that classifies network vs. parse failures
//! - [`heuristics`] - HTML link-tag, crawl-candidate and list-page matching
//! - [`discovery`] - the ordered fallback cascade built on the three above
//!
//! # Example
//!
//! ```ignore
//! use feedscout::feed::{FeedDiscoveryEngine, FeedFetcher};
//!
//! let engine = FeedDiscoveryEngine::new(FeedFetcher::new(reqwest::Client::new()));
//! let feed = engine.discover("https://example.com/news").await?;
//! println!("{} at {}", feed.title, feed.url);
//! ```

pub mod discovery;
pub mod fetcher;
pub mod heuristics;
pub mod parser;

pub use discovery::{DiscoveredFeed, DiscoveryError, FeedDiscoveryEngine, Strategy};
pub use fetcher::{FeedFetcher, FetchError, FetchedFeed};
pub use parser::{parse_feed, FeedItem, ParsedFeed};
