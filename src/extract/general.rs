//! General-purpose visible-text extraction.

use scraper::{ElementRef, Html, Selector};

use super::{PageContent, WIDGET_ROOT_ID};

/// Longest main-content excerpt forwarded to the API.
const MAX_CONTENT_CHARS: usize = 6000;

/// Elements whose subtrees never contribute visible text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Default extractor: walks the visible text of the main content region,
/// excluding the widget's own subtree and non-visible nodes.
pub struct GeneralStrategy {
    content_selectors: Vec<&'static str>,
}

impl GeneralStrategy {
    /// Create a strategy with the default main-content selectors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            content_selectors: vec![
                "article",
                "main",
                "[role='main']",
                ".content",
                "#content",
                "#root",
                "#app",
            ],
        }
    }
}

impl Default for GeneralStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl super::ExtractStrategy for GeneralStrategy {
    fn readiness_selectors(&self) -> &[&str] {
        &["body"]
    }

    fn extract(&self, html: &str, _url: &str) -> PageContent {
        let document = Html::parse_document(html);

        let title = extract_title(&document);
        let description = extract_meta(&document, "description")
            .or_else(|| extract_meta(&document, "og:description"));
        let main_content = extract_main_text(&document, &self.content_selectors);

        PageContent {
            title,
            description,
            main_content,
            profile: None,
        }
    }
}

/// Extract the page title from og:title, the title tag or the first h1.
pub(crate) fn extract_title(document: &Html) -> Option<String> {
    if let Some(og_title) = extract_meta(document, "og:title") {
        return Some(og_title);
    }

    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }

    None
}

/// Extract meta tag content by name or OpenGraph property.
pub(crate) fn extract_meta(document: &Html, name: &str) -> Option<String> {
    for attr in ["name", "property"] {
        let selector_str = format!("meta[{attr}='{name}']");
        if let Ok(selector) = Selector::parse(&selector_str) {
            if let Some(element) = document.select(&selector).next() {
                if let Some(content) = element.value().attr("content") {
                    let content = content.trim();
                    if !content.is_empty() {
                        return Some(content.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Extract the main visible text, trying content selectors in order and
/// falling back to the whole body.
fn extract_main_text(document: &Html, content_selectors: &[&'static str]) -> Option<String> {
    for selector_str in content_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = visible_text(element);
                if text.split_whitespace().count() > 20 {
                    return Some(truncate_chars(&text, MAX_CONTENT_CHARS));
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            let text = visible_text(body);
            if !text.is_empty() {
                return Some(truncate_chars(&text, MAX_CONTENT_CHARS));
            }
        }
    }

    None
}

/// Collect the visible text under an element, skipping scripts, styles and
/// the widget's own container.
pub(crate) fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_visible_text(element, &mut out);
    out.trim().to_string()
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let value = child_element.value();
            if SKIPPED_ELEMENTS.contains(&value.name()) {
                continue;
            }
            if value.attr("id") == Some(WIDGET_ROOT_ID) {
                continue;
            }
            if value
                .attr("style")
                .is_some_and(|style| style.contains("display:none") || style.contains("display: none"))
            {
                continue;
            }
            collect_visible_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
        }
    }
}

/// Truncate to at most `max` characters on a character boundary.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
