//! Navigation-driven orchestration of the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::chat::{ChatController, PendingItem};
use crate::classify::{classify, normalize_page_url};
use crate::config::WidgetConfig;
use crate::extract::{await_readiness, ExtractorRegistry, PageContext};
use crate::relay::{ApiRelay, RelayError};
use crate::store::{MessageStore, StateStore};

/// Fixed message shown when any stage of a conversation turn fails.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I ran into a problem answering that. Please try again.";

/// Read access to the current page.
///
/// The real host backs this with the live DOM; tests use fixture snapshots.
pub trait PageView: Send + Sync {
    /// Current page address.
    fn url(&self) -> String;

    /// Snapshot of the page's HTML.
    fn html(&self) -> String;
}

/// Reacts to navigation and user input, driving classification,
/// extraction, the relay and the render queue for each page view.
pub struct LifecycleController {
    chat: ChatController,
    relay: ApiRelay,
    registry: ExtractorRegistry,
    messages: Arc<dyn MessageStore>,
    state: Arc<dyn StateStore>,
    config: WidgetConfig,
    /// Bumped on every navigation; relay replies carrying an older value
    /// are stale and dropped instead of rendering into the wrong page.
    generation: AtomicU64,
    last_url: Mutex<Option<String>>,
}

impl LifecycleController {
    /// Create a controller wiring the given components together.
    #[must_use]
    pub fn new(
        chat: ChatController,
        relay: ApiRelay,
        registry: ExtractorRegistry,
        messages: Arc<dyn MessageStore>,
        state: Arc<dyn StateStore>,
        config: WidgetConfig,
    ) -> Self {
        Self {
            chat,
            relay,
            registry,
            messages,
            state,
            config,
            generation: AtomicU64::new(0),
            last_url: Mutex::new(None),
        }
    }

    /// The render queue controller, for host-driven teardown.
    #[must_use]
    pub const fn chat(&self) -> &ChatController {
        &self.chat
    }

    /// Handle a detected navigation: on a supported, enabled page this
    /// replays history, extracts context, sends a synthesized greeting and
    /// renders the reply. Every failure surfaces as a chat message; nothing
    /// propagates to the host page.
    pub async fn on_navigation(&self, view: &dyn PageView) {
        let url = view.url();
        if self.is_last_url(&url) {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(tag) = classify(&url) else {
            tracing::debug!(%url, "page not supported; widget inactive");
            self.remember_url(&url);
            return;
        };
        if !self.widget_active(tag).await {
            tracing::debug!(site = %tag, "widget disabled for this site");
            self.remember_url(&url);
            return;
        }

        let conversation = normalize_page_url(&url);
        self.chat.set_conversation(&conversation);
        if !self.chat.init_interface().await {
            // Not recorded, so the next notification for this URL retries.
            return;
        }
        self.remember_url(&url);

        self.replay_history(&conversation).await;

        if self.chat.rate_limited().await {
            tracing::debug!("cooling down; skipping automatic prompt");
            return;
        }

        let context = self.capture_context(view, tag).await;
        let greeting = greeting_for(&url);
        self.converse(generation, &greeting, &context).await;
    }

    /// Handle a message typed by the user on the current page.
    pub async fn on_user_message(&self, view: &dyn PageView, text: &str) {
        let url = view.url();
        let Some(tag) = classify(&url) else {
            return;
        };
        if !self.widget_active(tag).await {
            return;
        }

        let conversation = normalize_page_url(&url);
        self.chat.set_conversation(&conversation);
        if !self.chat.init_interface().await {
            return;
        }
        if self.chat.rate_limited().await {
            tracing::debug!("cooling down; ignoring user message");
            return;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let context = self.capture_context(view, tag).await;
        self.converse(generation, text, &context).await;
    }

    /// Send one message to the copilot and render the outcome.
    async fn converse(&self, generation: u64, message: &str, context: &PageContext) {
        self.chat.enqueue(PendingItem::user(message)).await;

        match self.relay.ask(message, context).await {
            // The cool-down window is process-wide, so it applies even when
            // the user has already left the page that triggered it.
            Err(RelayError::RateLimited) => {
                self.chat.begin_rate_limit().await;
            }
            outcome => {
                if self.generation.load(Ordering::SeqCst) != generation {
                    tracing::debug!("discarding outcome for a page the user left");
                    return;
                }
                match outcome {
                    Ok(reply) => self.chat.enqueue(PendingItem::bot(reply)).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "copilot call failed");
                        self.chat.enqueue(PendingItem::notice(APOLOGY_MESSAGE)).await;
                    }
                }
            }
        }
    }

    /// Replay stored history into the render queue without re-persisting.
    async fn replay_history(&self, conversation: &str) {
        match self.messages.load_all(conversation).await {
            Ok(history) => {
                for message in history {
                    self.chat
                        .enqueue(PendingItem::replay(message.content, message.from_user))
                        .await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load conversation history");
            }
        }
    }

    /// Await readiness and extract the page context for the relay.
    async fn capture_context(
        &self,
        view: &dyn PageView,
        tag: crate::classify::SiteTag,
    ) -> PageContext {
        let strategy = self.registry.strategy_for(tag);
        let fully_loaded = await_readiness(view, strategy.as_ref(), &self.config).await;

        let html = view.html();
        let url = normalize_page_url(&view.url());
        let content = strategy.extract(&html, &url);

        PageContext {
            url,
            site_tag: Some(tag),
            fully_loaded,
            content,
        }
    }

    fn is_last_url(&self, url: &str) -> bool {
        self.last_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(url)
    }

    fn remember_url(&self, url: &str) {
        *self
            .last_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
    }

    /// Whether the widget should run on this site, considering the global
    /// and per-site toggles with config defaults.
    async fn widget_active(&self, tag: crate::classify::SiteTag) -> bool {
        let globally_enabled = match self.state.widget_enabled().await {
            Ok(preference) => preference.unwrap_or(self.config.default_enabled),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read enable toggle");
                self.config.default_enabled
            }
        };
        if !globally_enabled {
            return false;
        }

        match self.state.site_enabled(tag).await {
            Ok(preference) => preference.unwrap_or(true),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read site toggle");
                true
            }
        }
    }
}

/// Synthesize the automatic greeting from the URL path: the last path
/// segment with separators spaced out, falling back to the hostname.
#[must_use]
pub fn greeting_for(url: &str) -> String {
    let parsed = Url::parse(url).ok();
    let subject = parsed
        .as_ref()
        .and_then(|u| {
            u.path_segments().and_then(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .next_back()
                    .map(|s| s.replace(['-', '_'], " "))
            })
        })
        .filter(|s| !s.is_empty())
        .or_else(|| parsed.as_ref().and_then(|u| u.host_str().map(str::to_string)))
        .unwrap_or_else(|| "this page".to_string());

    format!("What can you tell me about {subject}?")
}
