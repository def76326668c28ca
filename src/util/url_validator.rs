use std::net::IpAddr;
use thiserror::Error;

use super::site_url::SiteUrl;

/// Errors that can occur while accepting a submitted URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a submitted page URL before discovery starts.
///
/// Always rejects unparseable and non-HTTP(S) URLs. Unless
/// `allow_private_hosts` is set, also rejects localhost and private,
/// link-local or unspecified IP hosts so a submission cannot make the
/// server probe its own network.
///
/// # Examples
///
/// ```
/// use feedscout::util::validate_url;
///
/// let url = validate_url("https://example.com/news", false).unwrap();
/// assert_eq!(url.host(), "example.com");
///
/// assert!(validate_url("http://localhost/feed", false).is_err());
/// assert!(validate_url("http://127.0.0.1:8080/feed", true).is_ok());
/// ```
pub fn validate_url(url_str: &str, allow_private_hosts: bool) -> Result<SiteUrl, UrlValidationError> {
    let url = SiteUrl::parse(url_str)?;

    if allow_private_hosts {
        return Ok(url);
    }

    let host = url.host();
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
