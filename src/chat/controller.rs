//! The render queue state machine.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::WidgetConfig;
use crate::store::{MessageStore, StateStore, StoredMessage};

use super::paragraphs::{reveal_delay, split_paragraphs};
use super::rate_limit::RateLimitState;
use super::surface::{ChatSegment, ChatSurface};

/// A message waiting to be rendered.
#[derive(Clone, Debug)]
pub struct PendingItem {
    /// Message text.
    pub text: String,
    /// Whether the message is user-originated.
    pub from_user: bool,
    /// Whether to write the message to the conversation history.
    pub persist: bool,
    /// Whether to reveal the message paragraph by paragraph. Ignored for
    /// user messages, which always render as one atomic block.
    pub animate: bool,
}

impl PendingItem {
    /// A user message: atomic render, persisted.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: true,
            persist: true,
            animate: false,
        }
    }

    /// A fresh bot reply: paragraph reveal, persisted.
    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: false,
            persist: true,
            animate: true,
        }
    }

    /// A stored message replayed into the view: atomic render, not
    /// re-persisted.
    #[must_use]
    pub fn replay(text: impl Into<String>, from_user: bool) -> Self {
        Self {
            text: text.into(),
            from_user,
            persist: false,
            animate: false,
        }
    }

    /// A transient notice (advisory, apology): atomic render, not persisted.
    #[must_use]
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: false,
            persist: false,
            animate: false,
        }
    }
}

/// Queue entry carrying the conversation key captured at enqueue time.
struct QueueEntry {
    item: PendingItem,
    conversation: Option<String>,
}

struct Inner {
    surface: Arc<dyn ChatSurface>,
    messages: Arc<dyn MessageStore>,
    state: Arc<dyn StateStore>,
    config: WidgetConfig,
    queue: Mutex<VecDeque<QueueEntry>>,
    draining: AtomicBool,
    conversation: Mutex<Option<String>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// Serializes the presentation of chat messages.
///
/// Many producers may [`enqueue`](ChatController::enqueue) concurrently
/// (user input, relay replies, history replay, notices); exactly one drain
/// loop owns the queue at a time, so items reach the surface strictly in
/// enqueue order and at most one paragraph-reveal sequence animates at once.
///
/// Lifecycle: construct with [`ChatController::new`], release timers with
/// [`ChatController::teardown`]. Controllers are independent; nothing is
/// shared through module state.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

impl ChatController {
    /// Create a controller over the given surface and stores.
    #[must_use]
    pub fn new(
        surface: Arc<dyn ChatSurface>,
        messages: Arc<dyn MessageStore>,
        state: Arc<dyn StateStore>,
        config: WidgetConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                surface,
                messages,
                state,
                config,
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                conversation: Mutex::new(None),
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Set the conversation key new persisted items are appended under.
    pub fn set_conversation(&self, url: &str) {
        *self
            .inner
            .conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
    }

    /// Ensure the chat interface exists and re-apply any persisted
    /// rate-limit window. Returns `false` when the interface could not be
    /// created.
    pub async fn init_interface(&self) -> bool {
        if let Err(e) = self.inner.surface.ensure_interface().await {
            tracing::warn!(error = %e, "failed to create chat interface");
            return false;
        }
        self.restore_rate_limit().await;
        true
    }

    /// Append a message to the render queue.
    ///
    /// The caller that finds the queue idle runs the drain loop to
    /// completion before returning; callers arriving while a drain is in
    /// progress only append and return immediately.
    pub async fn enqueue(&self, item: PendingItem) {
        let conversation = self
            .inner
            .conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(QueueEntry { item, conversation });

        if !self.inner.draining.swap(true, Ordering::SeqCst) {
            self.drain().await;
        }
    }

    /// Whether an unexpired rate-limit window is currently persisted.
    pub async fn rate_limited(&self) -> bool {
        let now_ms = Utc::now().timestamp_millis();
        matches!(
            self.inner.state.rate_limit().await,
            Ok(Some(state)) if !state.is_expired(now_ms)
        )
    }

    /// Enter the cool-down state after a rate-limited relay call: persist
    /// the window, lock the input, show the advisory and start the expiry
    /// watcher.
    pub async fn begin_rate_limit(&self) {
        let now_ms = Utc::now().timestamp_millis();
        let state = RateLimitState::begin(now_ms, self.inner.config.rate_limit_window);
        let advisory = state.advisory_text(now_ms);

        if let Err(e) = self.inner.state.set_rate_limit(Some(state)).await {
            tracing::warn!(error = %e, "failed to persist rate-limit window");
        }
        self.inner.surface.set_input_enabled(false).await;
        tracing::info!("rate limit reached; input locked");

        self.enqueue(PendingItem::notice(advisory)).await;
        self.spawn_watcher();
    }

    /// Re-apply a persisted rate-limit window, clearing it when already
    /// expired. Called whenever the interface is (re)initialized.
    pub async fn restore_rate_limit(&self) {
        let now_ms = Utc::now().timestamp_millis();
        match self.inner.state.rate_limit().await {
            Ok(Some(state)) if state.is_expired(now_ms) => {
                self.clear_rate_limit().await;
            }
            Ok(Some(_)) => {
                self.inner.surface.set_input_enabled(false).await;
                self.spawn_watcher();
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to read rate-limit window");
            }
        }
    }

    /// Release the expiry watcher. Pending queue items are dropped.
    pub fn teardown(&self) {
        if let Some(handle) = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn drain(&self) {
        loop {
            let entry = self
                .inner
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();

            match entry {
                Some(entry) => self.render_entry(entry).await,
                None => {
                    self.inner.draining.store(false, Ordering::SeqCst);
                    // A producer may have appended between the empty pop and
                    // the flag reset; reclaim the queue if so.
                    let pending = !self
                        .inner
                        .queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .is_empty();
                    if pending && !self.inner.draining.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }
            }
        }
    }

    async fn render_entry(&self, entry: QueueEntry) {
        if let Err(e) = self.inner.surface.ensure_interface().await {
            tracing::warn!(error = %e, "dropping chat item; interface unavailable");
            return;
        }

        let item = entry.item;

        // Persist the complete message up front so history never reflects a
        // partially revealed reply.
        if item.persist {
            if let Some(conversation) = entry.conversation.as_deref() {
                let message = StoredMessage::new(item.text.clone(), item.from_user);
                if let Err(e) = self.inner.messages.append(conversation, message).await {
                    tracing::warn!(error = %e, "failed to persist chat message");
                }
            } else {
                tracing::warn!("no active conversation; message not persisted");
            }
        }

        if item.from_user || !item.animate {
            let segment = ChatSegment::new(item.text, item.from_user);
            if let Err(e) = self.inner.surface.append(segment).await {
                tracing::warn!(error = %e, "dropping unrenderable chat item");
            }
            return;
        }

        let paragraphs = split_paragraphs(&item.text);
        for (index, paragraph) in paragraphs.iter().enumerate() {
            let segment = ChatSegment::new(paragraph.clone(), false);
            if let Err(e) = self.inner.surface.append(segment).await {
                tracing::warn!(error = %e, "dropping remainder of unrenderable chat item");
                break;
            }
            if index + 1 < paragraphs.len() {
                tokio::time::sleep(reveal_delay(paragraph)).await;
            }
        }
    }

    /// Check the persisted window once; returns `true` when the cool-down
    /// is over and the watcher can stop.
    async fn check_rate_limit_expiry(&self) -> bool {
        let now_ms = Utc::now().timestamp_millis();
        match self.inner.state.rate_limit().await {
            Ok(Some(state)) if state.is_expired(now_ms) => {
                self.clear_rate_limit().await;
                true
            }
            Ok(Some(_)) => false,
            Ok(None) => {
                self.inner.surface.set_input_enabled(true).await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "rate-limit check failed");
                false
            }
        }
    }

    async fn clear_rate_limit(&self) {
        if let Err(e) = self.inner.state.set_rate_limit(None).await {
            tracing::warn!(error = %e, "failed to clear rate-limit window");
        }
        self.inner.surface.set_input_enabled(true).await;
        tracing::info!("rate limit expired; input unlocked");
    }

    fn spawn_watcher(&self) {
        let mut guard = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let controller = self.clone();
        *guard = Some(tokio::spawn(async move {
            let interval = controller.inner.config.rate_limit_check_interval;
            loop {
                tokio::time::sleep(interval).await;
                if controller.check_rate_limit_expiry().await {
                    break;
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::chat::surface::{MemorySurface, SurfaceError};
    use crate::store::MemoryStore;

    use super::*;

    fn controller_with(surface: Arc<dyn ChatSurface>) -> (ChatController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let controller = ChatController::new(
            surface,
            store.clone(),
            store.clone(),
            WidgetConfig::default(),
        );
        controller.set_conversation("https://dexscreener.com/solana/abc");
        (controller, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_order_matches_enqueue_order() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, _store) = controller_with(surface.clone());

        // First enqueue starts a drain that suspends between paragraphs.
        let background = controller.clone();
        let drain = tokio::spawn(async move {
            background
                .enqueue(PendingItem::bot("alpha\n\nbeta"))
                .await;
        });
        tokio::task::yield_now().await;

        // These arrive while the drain loop is mid-reveal.
        controller.enqueue(PendingItem::user("gamma")).await;
        controller.enqueue(PendingItem::notice("delta")).await;
        drain.await.unwrap();

        assert_eq!(surface.texts(), vec!["alpha", "beta", "gamma", "delta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_reply_revealed_in_paragraphs() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, _store) = controller_with(surface.clone());

        controller
            .enqueue(PendingItem::bot("one\n\ntwo\n\nthree"))
            .await;

        let segments = surface.segments();
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| !s.from_user));
    }

    #[tokio::test]
    async fn test_user_message_renders_atomically() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, _store) = controller_with(surface.clone());

        controller
            .enqueue(PendingItem::user("question\n\nwith two blocks"))
            .await;

        assert_eq!(surface.texts(), vec!["question\n\nwith two blocks"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_message_persisted_despite_reveal() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, store) = controller_with(surface.clone());

        controller
            .enqueue(PendingItem::bot("part one\n\npart two"))
            .await;

        let history = crate::store::MessageStore::load_all(
            store.as_ref(),
            "https://dexscreener.com/solana/abc",
        )
        .await
        .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "part one\n\npart two");
        assert!(!history[0].from_user);
    }

    #[tokio::test]
    async fn test_replay_is_not_repersisted() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, store) = controller_with(surface.clone());

        controller
            .enqueue(PendingItem::replay("old message", true))
            .await;

        let history = crate::store::MessageStore::load_all(
            store.as_ref(),
            "https://dexscreener.com/solana/abc",
        )
        .await
        .unwrap();
        assert!(history.is_empty());
        assert_eq!(surface.texts(), vec!["old message"]);
    }

    /// Surface that rejects segments containing a marker string.
    struct FlakySurface {
        inner: MemorySurface,
    }

    #[async_trait]
    impl ChatSurface for FlakySurface {
        async fn ensure_interface(&self) -> Result<(), SurfaceError> {
            self.inner.ensure_interface().await
        }

        async fn append(&self, segment: ChatSegment) -> Result<(), SurfaceError> {
            if segment.text.contains("poison") {
                return Err(SurfaceError::Render("marker segment".into()));
            }
            self.inner.append(segment).await
        }

        async fn set_input_enabled(&self, enabled: bool) {
            self.inner.set_input_enabled(enabled).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failure_does_not_stall_queue() {
        let surface = Arc::new(FlakySurface {
            inner: MemorySurface::new(),
        });
        let store = Arc::new(MemoryStore::default());
        let controller = ChatController::new(
            surface.clone(),
            store.clone(),
            store,
            WidgetConfig::default(),
        );
        controller.set_conversation("https://x.com/someuser");

        let background = controller.clone();
        let drain = tokio::spawn(async move {
            background.enqueue(PendingItem::notice("poison item")).await;
        });
        tokio::task::yield_now().await;
        controller.enqueue(PendingItem::notice("survivor")).await;
        drain.await.unwrap();

        assert_eq!(surface.inner.texts(), vec!["survivor"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_rate_limit() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, store) = controller_with(surface.clone());

        controller.begin_rate_limit().await;

        let state = crate::store::StateStore::rate_limit(store.as_ref())
            .await
            .unwrap()
            .expect("rate-limit window persisted");
        let window_ms = state.ends_at_ms - state.started_at_ms;
        assert_eq!(window_ms, 4 * 60 * 60 * 1000);

        assert!(!surface.input_enabled());
        let texts = surface.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("4 hours"));
        assert!(controller.rate_limited().await);

        controller.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_clears_window_once_expired() {
        let surface = Arc::new(MemorySurface::new());
        let store = Arc::new(MemoryStore::default());
        // A zero-length window is expired from the moment it is persisted;
        // timer clocks are simulated but the window itself is wall-clock.
        let controller = ChatController::new(
            surface.clone(),
            store.clone(),
            store.clone(),
            WidgetConfig::default().with_rate_limit_window(std::time::Duration::ZERO),
        );
        controller.set_conversation("https://x.com/someuser");

        controller.begin_rate_limit().await;
        assert!(!surface.input_enabled());
        assert!(
            crate::store::StateStore::rate_limit(store.as_ref())
                .await
                .unwrap()
                .is_some()
        );

        // Past the first watcher tick.
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;

        assert!(
            crate::store::StateStore::rate_limit(store.as_ref())
                .await
                .unwrap()
                .is_none()
        );
        assert!(surface.input_enabled());
        assert!(!controller.rate_limited().await);

        controller.teardown();
    }

    #[tokio::test]
    async fn test_restore_clears_expired_window() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, store) = controller_with(surface.clone());

        let expired = RateLimitState {
            started_at_ms: 0,
            ends_at_ms: 1,
        };
        crate::store::StateStore::set_rate_limit(store.as_ref(), Some(expired))
            .await
            .unwrap();
        surface.set_input_enabled(false).await;

        controller.init_interface().await;

        assert!(
            crate::store::StateStore::rate_limit(store.as_ref())
                .await
                .unwrap()
                .is_none()
        );
        assert!(surface.input_enabled());
        assert!(!controller.rate_limited().await);
    }

    #[tokio::test]
    async fn test_init_interface_is_idempotent() {
        let surface = Arc::new(MemorySurface::new());
        let (controller, _store) = controller_with(surface.clone());

        assert!(controller.init_interface().await);
        assert!(controller.init_interface().await);
        assert_eq!(surface.interfaces_created(), 1);
    }
}
