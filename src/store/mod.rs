//! Conversation history and persisted widget state.
//!
//! Two narrow traits cover everything the widget persists: [`MessageStore`]
//! holds per-page conversation history, [`StateStore`] holds the identity
//! token, the rate-limit window and the activation toggles. Both come with
//! an in-memory implementation for tests and ephemeral sessions
//! ([`MemoryStore`]) and a SQLite-backed one ([`SqliteStore`]).

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::RateLimitState;
use crate::classify::SiteTag;

/// Errors from storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),

    /// Serialization error for structured values.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A single message in a persisted conversation.
///
/// Immutable once created; conversations are append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message text.
    pub content: String,
    /// Whether the message originated from the user.
    pub from_user: bool,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub timestamp_ms: i64,
}

impl StoredMessage {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(content: impl Into<String>, from_user: bool) -> Self {
        Self {
            content: content.into(),
            from_user,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only conversation history keyed by normalized page URL.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to the conversation for `url`, creating the
    /// conversation on first write. Implementations cap each conversation
    /// at their configured history limit, evicting the oldest messages.
    async fn append(&self, url: &str, message: StoredMessage) -> StoreResult<()>;

    /// Load the full conversation for `url` in insertion order.
    async fn load_all(&self, url: &str) -> StoreResult<Vec<StoredMessage>>;
}

/// Persisted widget state shared across all pages in a session.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the persisted client identity token.
    async fn identity(&self) -> StoreResult<Option<String>>;

    /// Persist the client identity token.
    async fn set_identity(&self, token: &str) -> StoreResult<()>;

    /// Read the active rate-limit window, if any.
    async fn rate_limit(&self) -> StoreResult<Option<RateLimitState>>;

    /// Persist or clear the rate-limit window.
    async fn set_rate_limit(&self, state: Option<RateLimitState>) -> StoreResult<()>;

    /// Read the global enable toggle. `None` means "no preference yet".
    async fn widget_enabled(&self) -> StoreResult<Option<bool>>;

    /// Persist the global enable toggle.
    async fn set_widget_enabled(&self, enabled: bool) -> StoreResult<()>;

    /// Read the per-site activation toggle. `None` means "no preference".
    async fn site_enabled(&self, tag: SiteTag) -> StoreResult<Option<bool>>;

    /// Persist the per-site activation toggle.
    async fn set_site_enabled(&self, tag: SiteTag, enabled: bool) -> StoreResult<()>;
}

/// Storage key for the identity token.
pub(crate) const KEY_IDENTITY: &str = "identity_token";
/// Storage key for the rate-limit window.
pub(crate) const KEY_RATE_LIMIT: &str = "rate_limit_window";
/// Storage key for the global enable toggle.
pub(crate) const KEY_WIDGET_ENABLED: &str = "widget_enabled";

/// Storage key for a per-site activation toggle.
pub(crate) fn site_key(tag: SiteTag) -> String {
    format!("site_enabled:{tag}")
}
