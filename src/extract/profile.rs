//! Structured extraction for X profile and post pages.

use scraper::{Html, Selector};

use super::general::{extract_title, visible_text};
use super::{ExtractStrategy, GeneralStrategy, PageContent, ProfileContent};

/// Most recent posts forwarded to the API.
const MAX_POSTS: usize = 10;

/// Extractor for X: parses profile and post elements into a structured
/// shape, falling back to the general strategy's raw text when the
/// structured elements are absent (login walls, layout changes).
pub struct ProfileStrategy {
    general: GeneralStrategy,
}

impl ProfileStrategy {
    /// Create the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            general: GeneralStrategy::new(),
        }
    }

    fn structured(document: &Html) -> ProfileContent {
        let mut profile = ProfileContent::default();

        if let Ok(selector) = Selector::parse("[data-testid='UserName']") {
            if let Some(element) = document.select(&selector).next() {
                let full = visible_text(element);
                // The UserName block holds display name and @handle together.
                if let Some(at) = full.find('@') {
                    let (name, handle) = full.split_at(at);
                    let name = name.trim();
                    if !name.is_empty() {
                        profile.display_name = Some(name.to_string());
                    }
                    let handle = handle.split_whitespace().next().unwrap_or(handle);
                    profile.handle = Some(handle.to_string());
                } else if !full.is_empty() {
                    profile.display_name = Some(full);
                }
            }
        }

        if let Ok(selector) = Selector::parse("[data-testid='UserDescription']") {
            if let Some(element) = document.select(&selector).next() {
                let bio = visible_text(element);
                if !bio.is_empty() {
                    profile.bio = Some(bio);
                }
            }
        }

        if let Ok(selector) = Selector::parse("[data-testid='tweetText']") {
            profile.posts = document
                .select(&selector)
                .map(visible_text)
                .filter(|text| !text.is_empty())
                .take(MAX_POSTS)
                .collect();
        }

        profile
    }
}

impl Default for ProfileStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractStrategy for ProfileStrategy {
    fn readiness_selectors(&self) -> &[&str] {
        &["[data-testid='primaryColumn']"]
    }

    fn extract(&self, html: &str, url: &str) -> PageContent {
        let (profile, title) = {
            let document = Html::parse_document(html);
            (Self::structured(&document), extract_title(&document))
        };

        if profile.is_empty() {
            tracing::debug!("no structured profile elements; using general extraction");
            return self.general.extract(html, url);
        }

        PageContent {
            title,
            description: None,
            main_content: None,
            profile: Some(profile),
        }
    }
}
