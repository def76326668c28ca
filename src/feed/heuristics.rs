//! HTML heuristics used when a URL is a web page rather than a feed.
//!
//! All functions here are synchronous: the parsed `scraper::Html` tree is
//! built, queried and dropped inside one call, so nothing non-`Send` is
//! ever held across an await in the discovery cascade.

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::util::SiteUrl;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid CSS selector: a[href]"));
static TYPED_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[type]").expect("Invalid CSS selector: link[type]"));

const RSS_MIME: &str = "application/rss+xml";

/// Same-site links to try, in the order they were found, without repeats.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateSet {
    /// Add a candidate; returns false if it was already present.
    pub fn insert(&mut self, link: String) -> bool {
        if self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.order.push(link);
        true
    }

    pub fn contains(&self, link: &str) -> bool {
        self.seen.contains(link)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Find the `href` of the first `<link type="application/rss+xml">` element.
///
/// The href is returned as written; resolve it against the page URL.
pub fn find_feed_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&TYPED_LINKS)
        .filter(|el| {
            el.value()
                .attr("type")
                .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with(RSS_MIME))
        })
        .find_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_owned())
        .filter(|href| !href.is_empty())
}

/// Collect crawl candidates from a page's anchors.
///
/// - root-relative hrefs (`/path`) are prefixed with the page origin
/// - hrefs mentioning the page host (minus `www.`) are taken as written,
///   except protocol-relative ones which get the page scheme
pub fn crawl_candidates(html: &str, page: &SiteUrl) -> CandidateSet {
    let document = Html::parse_document(html);
    let origin = page.origin_prefix();
    let host = page.bare_host();
    let mut candidates = CandidateSet::default();

    let hrefs: Vec<&str> = document
        .select(&ANCHORS)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .collect();

    for href in hrefs.iter().filter(|h| is_root_relative(h)) {
        candidates.insert(format!("{origin}{href}"));
    }
    for href in hrefs.iter().filter(|h| !host.is_empty() && h.contains(host.as_str())) {
        if href.starts_with("//") {
            candidates.insert(page.resolve(href));
        } else if !is_root_relative(href) {
            candidates.insert((*href).to_owned());
        }
    }

    candidates
}

/// Whether a failed candidate looks like a page listing feeds.
///
/// Only the final path segment is inspected, for the substring `rss`.
pub fn is_list_page_candidate(candidate: &str) -> bool {
    candidate
        .rsplit('/')
        .next()
        .is_some_and(|segment| segment.contains("rss"))
}

/// The suffix a feed link on a list page must end with to match `page`.
///
/// `/` plus the page's last path segment with any extension removed, e.g.
/// `https://example.com/sections/world.html` gives `/world`. Pages without a
/// path segment have no stem.
pub fn list_page_stem(page: &SiteUrl) -> Option<String> {
    let segment = page.last_segment();
    let stem = match segment.rfind('.') {
        Some(dot) if segment[dot + 1..].chars().all(|c| c.is_alphanumeric() || c == '_') => {
            &segment[..dot]
        }
        _ => segment,
    };

    if stem.is_empty() {
        None
    } else {
        Some(format!("/{stem}"))
    }
}

/// Search a list page for an anchor ending in `stem`, `stem.rss` or `stem.xml`.
///
/// Suffixes are tried in that order; the first anchor matching the earliest
/// suffix wins.
pub fn find_list_link(html: &str, stem: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let hrefs: Vec<&str> = document
        .select(&ANCHORS)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .collect();

    [stem.to_owned(), format!("{stem}.rss"), format!("{stem}.xml")]
        .iter()
        .find_map(|suffix| hrefs.iter().find(|href| href.ends_with(suffix.as_str())))
        .map(|href| (*href).to_owned())
}

fn is_root_relative(href: &str) -> bool {
    href.starts_with('/') && !href.starts_with("//")
}
