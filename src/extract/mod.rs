//! Page content extraction.
//!
//! Extraction is polymorphic over the site tag: an [`ExtractorRegistry`]
//! maps each tag to an [`ExtractStrategy`], falling back to the general
//! text strategy for tags without a specialized one. Strategies are pure
//! over an HTML snapshot, so they run identically against a live page or a
//! fixture string.

pub mod general;
pub mod profile;

pub use general::GeneralStrategy;
pub use profile::ProfileStrategy;

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::classify::SiteTag;
use crate::config::WidgetConfig;
use crate::lifecycle::PageView;

/// Element id of the injected widget container. Extraction skips this
/// subtree so the assistant never reads its own output back as page
/// content.
pub const WIDGET_ROOT_ID: &str = "pagepilot-root";

/// Extracted textual snapshot of a page. Empty fields are omitted when
/// serialized into the API payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    /// Page title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Meta description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Main visible text of the content region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_content: Option<String>,
    /// Structured profile data, when a specialized strategy found it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileContent>,
}

/// Structured profile/post data extracted from a social page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileContent {
    /// Profile handle (e.g. `@someuser`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Profile bio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Recent visible post texts, newest first as they appear in the DOM.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub posts: Vec<String>,
}

impl ProfileContent {
    /// Whether any structured field was populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
            && self.display_name.is_none()
            && self.bio.is_none()
            && self.posts.is_empty()
    }
}

/// Everything the relay needs to describe the current page. Recomputed per
/// navigation; never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageContext {
    /// Normalized page URL.
    pub url: String,
    /// Site tag, when the page is a recognized origin.
    pub site_tag: Option<SiteTag>,
    /// Whether the readiness probe saw the required elements before its
    /// timeout.
    pub fully_loaded: bool,
    /// Extracted content.
    pub content: PageContent,
}

/// One extraction strategy, selected per site tag.
pub trait ExtractStrategy: Send + Sync {
    /// CSS selectors that must all be present before the page is
    /// considered loaded enough to extract.
    fn readiness_selectors(&self) -> &[&str];

    /// Extract content from an HTML snapshot. Infallible: strategies fall
    /// back to partial or empty content rather than erroring.
    fn extract(&self, html: &str, url: &str) -> PageContent;
}

/// Maps site tags to extraction strategies.
pub struct ExtractorRegistry {
    strategies: HashMap<SiteTag, Arc<dyn ExtractStrategy>>,
    general: Arc<dyn ExtractStrategy>,
}

impl ExtractorRegistry {
    /// Registry with the built-in strategies: the structured profile
    /// strategy for X, the general text strategy for everything else.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut strategies: HashMap<SiteTag, Arc<dyn ExtractStrategy>> = HashMap::new();
        strategies.insert(SiteTag::X, Arc::new(ProfileStrategy::new()));
        Self {
            strategies,
            general: Arc::new(GeneralStrategy::new()),
        }
    }

    /// Register (or replace) the strategy for a site tag.
    pub fn register(&mut self, tag: SiteTag, strategy: Arc<dyn ExtractStrategy>) {
        self.strategies.insert(tag, strategy);
    }

    /// Strategy for a tag, falling back to the general strategy.
    #[must_use]
    pub fn strategy_for(&self, tag: SiteTag) -> Arc<dyn ExtractStrategy> {
        self.strategies
            .get(&tag)
            .cloned()
            .unwrap_or_else(|| self.general.clone())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Poll the page until the strategy's required elements appear, up to the
/// configured timeout. Returns whether the page became ready; extraction
/// proceeds with partial content either way.
pub async fn await_readiness(
    view: &dyn PageView,
    strategy: &dyn ExtractStrategy,
    config: &WidgetConfig,
) -> bool {
    let deadline = tokio::time::Instant::now() + config.readiness_timeout;
    loop {
        let ready = {
            let html = view.html();
            selectors_present(&html, strategy.readiness_selectors())
        };
        if ready {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::debug!("readiness probe timed out; extracting partial content");
            return false;
        }
        tokio::time::sleep(config.readiness_poll_interval).await;
    }
}

/// Whether every selector matches at least one element. Unparseable
/// selectors are skipped rather than blocking readiness forever.
fn selectors_present(html: &str, selectors: &[&str]) -> bool {
    let document = Html::parse_document(html);
    selectors.iter().all(|raw| match Selector::parse(raw) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_fallback() {
        let registry = ExtractorRegistry::with_defaults();
        let strategy = registry.strategy_for(SiteTag::Dexscreener);
        // The general strategy only needs a body to proceed.
        assert_eq!(strategy.readiness_selectors(), ["body"]);
    }

    #[test]
    fn test_registry_specialized_for_x() {
        let registry = ExtractorRegistry::with_defaults();
        let strategy = registry.strategy_for(SiteTag::X);
        assert_ne!(strategy.readiness_selectors(), ["body"]);
    }

    #[test]
    fn test_selectors_present() {
        let html = "<html><body><main><h1>hi</h1></main></body></html>";
        assert!(selectors_present(html, &["main", "h1"]));
        assert!(!selectors_present(html, &["main", "article"]));
        assert!(selectors_present(html, &[]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_times_out_on_missing_elements() {
        struct BareView;

        impl PageView for BareView {
            fn url(&self) -> String {
                "https://x.com/someuser".to_string()
            }

            fn html(&self) -> String {
                "<html><head><title>X</title></head>\
                 <body><p>loading timeline</p></body></html>"
                    .to_string()
            }
        }

        let config = WidgetConfig::default();
        let strategy = ProfileStrategy::new();
        let started = tokio::time::Instant::now();

        // The profile column never appears; the probe polls to the deadline.
        let ready = await_readiness(&BareView, &strategy, &config).await;
        assert!(!ready);
        assert!(started.elapsed() >= config.readiness_timeout);

        // Extraction still yields what the partial page has.
        let content = strategy.extract(&BareView.html(), "https://x.com/someuser");
        assert_eq!(content.title.as_deref(), Some("X"));
        assert!(
            content
                .main_content
                .as_deref()
                .is_some_and(|text| text.contains("loading timeline"))
        );
    }

    #[test]
    fn test_empty_fields_omitted_from_payload() {
        let content = PageContent {
            title: Some("Title".into()),
            ..PageContent::default()
        };
        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(json, r#"{"title":"Title"}"#);
    }
}
