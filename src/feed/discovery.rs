use std::fmt;
use thiserror::Error;

use super::fetcher::{FeedFetcher, FetchError, FetchedFeed};
use super::heuristics::{
    crawl_candidates, find_feed_link, find_list_link, is_list_page_candidate, list_page_stem,
};
use super::parser::FeedItem;
use crate::util::SiteUrl;

/// The strategies of the discovery cascade, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fetch the submitted URL and parse it as a feed
    DirectFetch,
    /// Follow a `<link type="application/rss+xml">` on the page
    LinkTag,
    /// Try same-site anchors one by one, including list-page matching
    Crawl,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::DirectFetch => "direct fetch",
            Strategy::LinkTag => "link tag",
            Strategy::Crawl => "crawl",
        })
    }
}

const CASCADE: [Strategy; 3] = [Strategy::DirectFetch, Strategy::LinkTag, Strategy::Crawl];

/// A feed located from a submitted URL.
#[derive(Debug, Clone)]
pub struct DiscoveredFeed {
    /// Feed title, used as the source name
    pub title: String,
    /// The URL the feed was actually fetched from
    pub url: String,
    pub items: Vec<FeedItem>,
    pub fetched_at: i64,
    /// The strategy that produced this feed
    pub strategy: Strategy,
}

impl DiscoveredFeed {
    fn from_fetch(feed: FetchedFeed, strategy: Strategy) -> Self {
        Self {
            title: feed.title,
            url: feed.url,
            items: feed.items,
            fetched_at: feed.fetched_at,
            strategy,
        }
    }
}

/// Why no feed could be located. Every variant names the submitted URL.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The submitted string is not an absolute http(s) URL
    #[error("{url} is not a proper feed: invalid URL")]
    InvalidUrl { url: String },
    /// A fetch failed at the network level (connection, status, timeout)
    #[error("{url} is not a proper feed: {source}")]
    Network {
        url: String,
        #[source]
        source: FetchError,
    },
    /// The page advertised a feed link that did not parse as a feed
    #[error("{url} is not a proper feed: not a feed")]
    NotAFeed { url: String },
    /// The page has no link tag and no same-site anchors to crawl
    #[error("{url} is not a proper feed: no rss links found")]
    NoCandidates { url: String },
    /// Every crawl candidate failed
    #[error("{url} is not a proper feed: crawl failed")]
    CrawlExhausted { url: String },
}

/// Result of running one strategy.
#[derive(Debug)]
enum Step {
    Found(DiscoveredFeed),
    Continue,
    Fail(DiscoveryError),
}

/// State threaded through the cascade for one discovery call.
struct Attempt {
    page: SiteUrl,
    /// HTML body kept from the direct fetch's parse failure
    body: Option<String>,
}

/// Turns an arbitrary page URL into a parsed feed.
///
/// Strategies run strictly in order and the first success wins:
///
/// 1. **Direct fetch** of the URL. A network-level failure ends discovery;
///    a body that is not a feed is kept for the next strategies.
/// 2. **Link tag**: follow the page's `application/rss+xml` link, resolved
///    against the page URL.
/// 3. **Crawl**: try same-site anchors sequentially. A candidate whose last
///    path segment mentions `rss` is treated as a possible list of feeds and
///    searched for a link matching the submitted page's last segment.
///
/// Candidates are never fetched concurrently; this bounds outbound requests
/// per discovery and keeps the order deterministic.
#[derive(Debug, Clone)]
pub struct FeedDiscoveryEngine {
    fetcher: FeedFetcher,
}

impl FeedDiscoveryEngine {
    pub fn new(fetcher: FeedFetcher) -> Self {
        Self { fetcher }
    }

    /// Locate and parse the feed behind `url`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the strategy that ended the cascade; see
    /// [`DiscoveryError`].
    pub async fn discover(&self, url: &str) -> Result<DiscoveredFeed, DiscoveryError> {
        let page = SiteUrl::parse(url).map_err(|_| DiscoveryError::InvalidUrl {
            url: url.to_owned(),
        })?;
        let mut attempt = Attempt { page, body: None };

        for strategy in CASCADE {
            match self.run(strategy, &mut attempt).await {
                Step::Found(feed) => {
                    tracing::debug!(
                        url = %attempt.page,
                        feed_url = %feed.url,
                        strategy = %strategy,
                        "Discovered feed"
                    );
                    return Ok(feed);
                }
                Step::Continue => {
                    tracing::debug!(url = %attempt.page, strategy = %strategy, "Strategy found nothing, falling back");
                }
                Step::Fail(e) => {
                    tracing::warn!(url = %attempt.page, strategy = %strategy, error = %e, "Feed discovery failed");
                    return Err(e);
                }
            }
        }

        // Crawl never continues, so the loop always returns above
        Err(DiscoveryError::CrawlExhausted {
            url: attempt.page.to_string(),
        })
    }

    async fn run(&self, strategy: Strategy, attempt: &mut Attempt) -> Step {
        match strategy {
            Strategy::DirectFetch => self.direct_fetch(attempt).await,
            Strategy::LinkTag => self.link_tag(attempt).await,
            Strategy::Crawl => self.crawl(attempt).await,
        }
    }

    async fn direct_fetch(&self, attempt: &mut Attempt) -> Step {
        match self.fetcher.fetch(attempt.page.as_str()).await {
            Ok(feed) => Step::Found(DiscoveredFeed::from_fetch(feed, Strategy::DirectFetch)),
            Err(FetchError::NotAFeed { body }) => {
                attempt.body = Some(body);
                Step::Continue
            }
            Err(source) => Step::Fail(DiscoveryError::Network {
                url: attempt.page.to_string(),
                source,
            }),
        }
    }

    async fn link_tag(&self, attempt: &mut Attempt) -> Step {
        let Some(href) = attempt.body.as_deref().and_then(find_feed_link) else {
            return Step::Continue;
        };
        let feed_url = attempt.page.resolve(&href);
        tracing::debug!(url = %attempt.page, feed_url = %feed_url, "Following rss link tag");

        match self.fetcher.fetch(&feed_url).await {
            Ok(feed) => Step::Found(DiscoveredFeed::from_fetch(feed, Strategy::LinkTag)),
            Err(source) if source.is_network_failure() => Step::Fail(DiscoveryError::Network {
                url: attempt.page.to_string(),
                source,
            }),
            Err(_) => Step::Fail(DiscoveryError::NotAFeed {
                url: attempt.page.to_string(),
            }),
        }
    }

    async fn crawl(&self, attempt: &mut Attempt) -> Step {
        let candidates = attempt
            .body
            .as_deref()
            .map(|body| crawl_candidates(body, &attempt.page))
            .unwrap_or_default();

        if candidates.is_empty() {
            return Step::Fail(DiscoveryError::NoCandidates {
                url: attempt.page.to_string(),
            });
        }

        let stem = list_page_stem(&attempt.page);
        tracing::debug!(url = %attempt.page, candidates = candidates.len(), "Crawling for feed");

        for candidate in candidates.iter() {
            match self.fetcher.fetch(candidate).await {
                Ok(feed) => return Step::Found(DiscoveredFeed::from_fetch(feed, Strategy::Crawl)),
                Err(err) => {
                    if let Some(feed) = self.match_list_page(candidate, &err, stem.as_deref()).await {
                        return Step::Found(DiscoveredFeed::from_fetch(feed, Strategy::Crawl));
                    }
                    tracing::debug!(candidate = %candidate, error = %err, "Crawl candidate rejected");
                }
            }
        }

        Step::Fail(DiscoveryError::CrawlExhausted {
            url: attempt.page.to_string(),
        })
    }

    /// Treat a failed candidate as a page listing feeds and look for the one
    /// matching the submitted page.
    async fn match_list_page(
        &self,
        candidate: &str,
        err: &FetchError,
        stem: Option<&str>,
    ) -> Option<FetchedFeed> {
        if !is_list_page_candidate(candidate) {
            return None;
        }
        let href = find_list_link(err.page_body()?, stem?)?;
        let feed_url = match SiteUrl::parse(candidate) {
            Ok(list_page) => list_page.resolve(&href),
            Err(_) => href,
        };

        tracing::debug!(list_page = %candidate, feed_url = %feed_url, "Matched feed on list page");
        self.fetcher.fetch(&feed_url).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example News</title>
  <item><guid>1</guid><title>First Post</title><link>https://example.com/post/1</link></item>
</channel></rss>"#;

    fn engine() -> FeedDiscoveryEngine {
        FeedDiscoveryEngine::new(FeedFetcher::new(reqwest::Client::new()))
    }

    async fn mount(server: &MockServer, route: &str, status: u16, body: &str, hits: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(hits)
            .mount(server)
            .await;
    }

    fn html(body: &str) -> String {
        format!("<html><head><title>Page</title></head><body>{body}</body></html>")
    }

    #[tokio::test]
    async fn test_direct_feed_url() {
        let server = MockServer::start().await;
        mount(&server, "/feed.xml", 200, RSS, 1).await;
        let url = format!("{}/feed.xml", server.uri());

        let feed = engine().discover(&url).await.unwrap();
        assert_eq!(feed.url, url);
        assert_eq!(feed.title, "Example News");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.strategy, Strategy::DirectFetch);
    }

    #[tokio::test]
    async fn test_network_failure_stops_cascade() {
        let server = MockServer::start().await;
        mount(&server, "/down", 503, "unavailable", 1).await;

        let err = engine()
            .discover(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::Network {
                source: FetchError::HttpStatus(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_link_tag_wins_over_crawl() {
        let server = MockServer::start().await;
        let page = html(
            r#"<link type="application/rss+xml" href="/feed.xml">
               <a href="/about">About</a><a href="/rss">RSS</a>"#,
        );
        mount(&server, "/blog", 200, &page, 1).await;
        mount(&server, "/feed.xml", 200, RSS, 1).await;
        mount(&server, "/about", 200, RSS, 0).await;
        mount(&server, "/rss", 200, RSS, 0).await;

        let feed = engine()
            .discover(&format!("{}/blog", server.uri()))
            .await
            .unwrap();
        assert_eq!(feed.strategy, Strategy::LinkTag);
        assert_eq!(feed.url, format!("{}/feed.xml", server.uri()));
    }

    #[tokio::test]
    async fn test_link_tag_to_non_feed_fails() {
        let server = MockServer::start().await;
        let page = html(r#"<link type="application/rss+xml" href="/broken">"#);
        mount(&server, "/blog", 200, &page, 1).await;
        mount(&server, "/broken", 200, &html("nope"), 1).await;

        let err = engine()
            .discover(&format!("{}/blog", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NotAFeed { .. }));
    }

    #[tokio::test]
    async fn test_crawl_finds_feed_among_candidates() {
        let server = MockServer::start().await;
        let page = html(r#"<a href="/about">About</a><a href="/feeds/main">Subscribe</a>"#);
        mount(&server, "/", 200, &page, 1).await;
        mount(&server, "/about", 200, &html("about us"), 1).await;
        mount(&server, "/feeds/main", 200, RSS, 1).await;

        let feed = engine().discover(&server.uri()).await.unwrap();
        assert_eq!(feed.strategy, Strategy::Crawl);
        assert_eq!(feed.url, format!("{}/feeds/main", server.uri()));
    }

    #[tokio::test]
    async fn test_crawl_stops_at_first_success() {
        let server = MockServer::start().await;
        let page = html(r#"<a href="/one">1</a><a href="/two">2</a>"#);
        mount(&server, "/home", 200, &page, 1).await;
        mount(&server, "/one", 200, RSS, 1).await;
        mount(&server, "/two", 200, RSS, 0).await;

        let feed = engine()
            .discover(&format!("{}/home", server.uri()))
            .await
            .unwrap();
        assert_eq!(feed.url, format!("{}/one", server.uri()));
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let server = MockServer::start().await;
        let page = html(r#"<a href="https://elsewhere.org/">Elsewhere</a>"#);
        mount(&server, "/lonely", 200, &page, 1).await;

        let err = engine()
            .discover(&format!("{}/lonely", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NoCandidates { .. }));
        assert!(err.to_string().ends_with("no rss links found"));
    }

    #[tokio::test]
    async fn test_crawl_exhausted() {
        let server = MockServer::start().await;
        let page = html(r#"<a href="/contact">Contact</a><a href="/rss">RSS</a>"#);
        mount(&server, "/news", 200, &page, 1).await;
        mount(&server, "/contact", 200, &html("contact"), 1).await;
        // list page without a matching anchor
        mount(&server, "/rss", 200, &html(r#"<a href="/feeds/sport.xml">Sport</a>"#), 1).await;

        let err = engine()
            .discover(&format!("{}/news", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::CrawlExhausted { .. }));
        assert!(err.to_string().ends_with("crawl failed"));
    }

    #[tokio::test]
    async fn test_list_page_heuristic() {
        let server = MockServer::start().await;
        let page = html(r#"<a href="/rss">All our feeds</a>"#);
        let list = html(
            r#"<a href="/feeds/sport.xml">Sport</a>
               <a href="/feeds/world.xml">World</a>"#,
        );
        mount(&server, "/sections/world.html", 200, &page, 1).await;
        mount(&server, "/rss", 200, &list, 1).await;
        mount(&server, "/feeds/world.xml", 200, RSS, 1).await;
        mount(&server, "/feeds/sport.xml", 200, RSS, 0).await;

        let feed = engine()
            .discover(&format!("{}/sections/world.html", server.uri()))
            .await
            .unwrap();
        assert_eq!(feed.strategy, Strategy::Crawl);
        assert_eq!(feed.url, format!("{}/feeds/world.xml", server.uri()));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = engine().discover("not a url").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidUrl { .. }));
    }
}
