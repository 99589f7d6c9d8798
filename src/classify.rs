//! Hostname-based classification of supported pages.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Identifier for a recognized website origin.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteTag {
    /// Dexscreener token pages.
    Dexscreener,
    /// X (formerly Twitter) profiles and posts.
    X,
}

impl SiteTag {
    /// Wire-format name of the tag, sent to the API as `pageType`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dexscreener => "dexscreener",
            Self::X => "x",
        }
    }
}

impl fmt::Display for SiteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered hostname table. Entries are disjoint; order only makes the
/// lookup deterministic.
const HOST_TABLE: &[(&str, SiteTag)] = &[
    ("dexscreener.com", SiteTag::Dexscreener),
    ("x.com", SiteTag::X),
    ("twitter.com", SiteTag::X),
];

/// Map a URL to a known site tag, or `None` when the widget should stay
/// inactive on this page.
///
/// Matching is by hostname only and tolerates subdomains
/// (`www.dexscreener.com` matches `dexscreener.com`).
#[must_use]
pub fn classify(url: &str) -> Option<SiteTag> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    HOST_TABLE
        .iter()
        .find(|(entry, _)| host == *entry || host.ends_with(&format!(".{entry}")))
        .map(|(_, tag)| *tag)
}

/// Normalize a page URL for use as a conversation key.
///
/// Fragments never identify a distinct page, so they are stripped; the rest
/// of the URL (including the query) is preserved as-is. Unparseable input is
/// returned unchanged so callers always get a usable key.
#[must_use]
pub fn normalize_page_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dexscreener() {
        assert_eq!(
            classify("https://dexscreener.com/solana/abc"),
            Some(SiteTag::Dexscreener)
        );
    }

    #[test]
    fn test_classify_subdomain() {
        assert_eq!(
            classify("https://www.dexscreener.com/ethereum/0x123"),
            Some(SiteTag::Dexscreener)
        );
    }

    #[test]
    fn test_classify_x_and_twitter() {
        assert_eq!(classify("https://x.com/someuser"), Some(SiteTag::X));
        assert_eq!(classify("https://twitter.com/someuser"), Some(SiteTag::X));
    }

    #[test]
    fn test_classify_unknown_host() {
        assert_eq!(classify("https://example.com"), None);
    }

    #[test]
    fn test_classify_rejects_lookalike_host() {
        assert_eq!(classify("https://notdexscreener.com/solana/abc"), None);
    }

    #[test]
    fn test_classify_invalid_url() {
        assert_eq!(classify("not a url"), None);
    }

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(
            normalize_page_url("https://dexscreener.com/solana/abc#chart"),
            "https://dexscreener.com/solana/abc"
        );
    }

    #[test]
    fn test_normalize_keeps_query() {
        assert_eq!(
            normalize_page_url("https://x.com/search?q=sol"),
            "https://x.com/search?q=sol"
        );
    }
}
