//! URL variants treated as the same site for deduplication.
//!
//! `http://site.com`, `https://www.site.com/` and the six other
//! scheme/`www.`/trailing-slash combinations form one cluster.

use std::collections::BTreeSet;

const SCHEMES: [&str; 2] = ["http://", "https://"];
const WWW_PREFIXES: [&str; 2] = ["", "www."];
const SLASH_SUFFIXES: [&str; 2] = ["", "/"];

/// The cluster a URL belongs to: host and path with the scheme, a leading
/// `www.` and one trailing slash removed.
///
/// ```
/// use feedscout::registry::cluster_key;
///
/// assert_eq!(cluster_key("https://www.site.com/"), "site.com");
/// assert_eq!(cluster_key("http://site.com/news"), "site.com/news");
/// ```
pub fn cluster_key(url: &str) -> String {
    let url = url.trim();
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url.strip_prefix("//").unwrap_or(url),
    };
    let bare = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    bare.strip_suffix('/').unwrap_or(bare).to_owned()
}

/// All eight URL spellings of the cluster `url` belongs to.
///
/// Every combination of `http`/`https`, with/without `www.` and with/without
/// a trailing slash is produced, whether or not the input is one of them.
pub fn candidate_keys(url: &str) -> BTreeSet<String> {
    let stripped = cluster_key(url);
    let mut keys = BTreeSet::new();
    for scheme in SCHEMES {
        for www in WWW_PREFIXES {
            for slash in SLASH_SUFFIXES {
                keys.insert(format!("{scheme}{www}{stripped}{slash}"));
            }
        }
    }
    keys
}
