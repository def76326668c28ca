use feed_rs::parser;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::util::sanitize_title;

const UNTITLED_FEED: &str = "Untitled Feed";

/// One entry of a parsed feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub guid: String,
    pub title: String,
    pub url: Option<String>,
    pub published: Option<i64>,
    pub summary: Option<String>,
}

/// A body that parsed as RSS, Atom or JSON Feed.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Channel title, sanitized; `"Untitled Feed"` when the feed has none
    pub title: String,
    pub items: Vec<FeedItem>,
}

/// Parse a response body as a syndication feed.
///
/// # Errors
///
/// Returns the `feed-rs` error when the body is not a feed (HTML pages,
/// truncated XML, plain text).
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| sanitize_title(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_FEED.to_owned());

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone());
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| sanitize_title(&t.content))
                .unwrap_or_else(|| "Untitled".to_owned());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = generate_guid(existing_id, url.as_deref(), &title, published);

            FeedItem {
                guid,
                title,
                url,
                published,
                summary,
            }
        })
        .collect();

    Ok(ParsedFeed { title, items })
}

fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing.map(str::trim).filter(|g| !g.is_empty()) {
        return guid.to_owned();
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
