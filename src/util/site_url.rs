use std::fmt;

use url::Url;

use super::url_validator::UrlValidationError;

/// A submitted page URL, parsed once into its structural parts.
///
/// The raw string is kept alongside the parsed form: feed documents are
/// keyed by the exact string the caller gave us, while href resolution and
/// crawl heuristics need scheme, host and path as separate fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrl {
    raw: String,
    parsed: Url,
}

impl SiteUrl {
    /// Parse an absolute `http`/`https` URL.
    ///
    /// # Errors
    ///
    /// Fails when the string is not a URL, uses another scheme, or has no host.
    pub fn parse(raw: &str) -> Result<Self, UrlValidationError> {
        let trimmed = raw.trim();
        let parsed = Url::parse(trimmed)?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(UrlValidationError::MissingHost);
        }

        Ok(Self {
            raw: trimmed.to_owned(),
            parsed,
        })
    }

    /// The URL exactly as submitted (surrounding whitespace removed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        self.parsed.scheme()
    }

    pub fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }

    /// `host[:port]`; the port is omitted when it is the scheme default.
    pub fn authority(&self) -> String {
        match self.parsed.port() {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_owned(),
        }
    }

    /// Authority with a leading `www.` removed, used to spot same-site anchors.
    pub fn bare_host(&self) -> String {
        let authority = self.authority();
        match authority.strip_prefix("www.") {
            Some(rest) => rest.to_owned(),
            None => authority,
        }
    }

    /// `scheme://host[:port]`, the prefix root-relative hrefs are resolved against.
    pub fn origin_prefix(&self) -> String {
        format!("{}://{}", self.scheme(), self.authority())
    }

    pub fn path(&self) -> &str {
        self.parsed.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.parsed.query()
    }

    /// Final non-empty path segment; trailing slashes are ignored.
    ///
    /// `https://example.com/news/` and `https://example.com/news` both yield
    /// `"news"`; a bare origin yields `""`.
    pub fn last_segment(&self) -> &str {
        self.path()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Resolve an href found on this page into an absolute URL string.
    ///
    /// - `//host/path` is protocol-relative and takes this page's scheme.
    /// - `/path` is root-relative and takes this page's origin.
    /// - `http://` and `https://` hrefs are already absolute.
    /// - anything else is joined against the page URL.
    pub fn resolve(&self, href: &str) -> String {
        let href = href.trim();

        if href.starts_with("//") {
            return format!("{}:{href}", self.scheme());
        }
        if href.starts_with('/') {
            return format!("{}{href}", self.origin_prefix());
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_owned();
        }

        match self.parsed.join(href) {
            Ok(joined) => joined.to_string(),
            Err(_) => href.to_owned(),
        }
    }
}

impl fmt::Display for SiteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(raw: &str) -> SiteUrl {
        SiteUrl::parse(raw).unwrap()
    }

    #[test]
    fn test_structural_parts() {
        let url = site("https://www.example.com:8443/blog/news.html?page=2");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host(), "www.example.com");
        assert_eq!(url.authority(), "www.example.com:8443");
        assert_eq!(url.bare_host(), "example.com:8443");
        assert_eq!(url.origin_prefix(), "https://www.example.com:8443");
        assert_eq!(url.path(), "/blog/news.html");
        assert_eq!(url.query(), Some("page=2"));
        assert_eq!(url.last_segment(), "news.html");
    }

    #[test]
    fn test_raw_string_preserved() {
        let url = site("  http://example.com  ");
        assert_eq!(url.as_str(), "http://example.com");
        assert_eq!(url.to_string(), "http://example.com");
    }

    #[test]
    fn test_default_port_omitted() {
        assert_eq!(site("http://example.com:80/a").origin_prefix(), "http://example.com");
    }

    #[test]
    fn test_last_segment_ignores_trailing_slash() {
        assert_eq!(site("https://example.com/news/").last_segment(), "news");
        assert_eq!(site("https://example.com").last_segment(), "");
    }

    #[test]
    fn test_resolve_root_relative() {
        assert_eq!(
            site("http://example.com/news").resolve("/feed.xml"),
            "http://example.com/feed.xml"
        );
    }

    #[test]
    fn test_resolve_protocol_relative() {
        assert_eq!(
            site("https://example.com/a").resolve("//cdn.example.com/feed.xml"),
            "https://cdn.example.com/feed.xml"
        );
    }

    #[test]
    fn test_resolve_absolute_untouched() {
        assert_eq!(
            site("https://example.com").resolve("http://feeds.other.org/rss"),
            "http://feeds.other.org/rss"
        );
    }

    #[test]
    fn test_resolve_path_relative() {
        assert_eq!(
            site("https://example.com/blog/").resolve("feed.xml"),
            "https://example.com/blog/feed.xml"
        );
    }

    #[test]
    fn test_parse_rejects_non_http() {
        assert!(matches!(
            SiteUrl::parse("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            SiteUrl::parse("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
