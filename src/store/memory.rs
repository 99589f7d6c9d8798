//! In-memory storage backend.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::chat::RateLimitState;
use crate::classify::SiteTag;

use super::{
    KEY_IDENTITY, KEY_RATE_LIMIT, KEY_WIDGET_ENABLED, MessageStore, StateStore, StoreResult,
    StoredMessage, site_key,
};

/// Process-local store backed by concurrent maps.
///
/// Used by tests and by hosts that do not need persistence across sessions.
pub struct MemoryStore {
    conversations: DashMap<String, Vec<StoredMessage>>,
    values: DashMap<String, String>,
    history_limit: usize,
}

impl MemoryStore {
    /// Create a store capping each conversation at `history_limit` messages.
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            values: DashMap::new(),
            history_limit,
        }
    }

    /// Number of tracked conversations.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(200)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, url: &str, message: StoredMessage) -> StoreResult<()> {
        let mut entry = self.conversations.entry(url.to_string()).or_default();
        entry.push(message);
        let len = entry.len();
        if len > self.history_limit {
            entry.drain(0..len - self.history_limit);
        }
        Ok(())
    }

    async fn load_all(&self, url: &str) -> StoreResult<Vec<StoredMessage>> {
        Ok(self
            .conversations
            .get(url)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn identity(&self) -> StoreResult<Option<String>> {
        Ok(self.values.get(KEY_IDENTITY).map(|v| v.clone()))
    }

    async fn set_identity(&self, token: &str) -> StoreResult<()> {
        self.values
            .insert(KEY_IDENTITY.to_string(), token.to_string());
        Ok(())
    }

    async fn rate_limit(&self) -> StoreResult<Option<RateLimitState>> {
        match self.values.get(KEY_RATE_LIMIT) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_rate_limit(&self, state: Option<RateLimitState>) -> StoreResult<()> {
        match state {
            Some(state) => {
                let raw = serde_json::to_string(&state)?;
                self.values.insert(KEY_RATE_LIMIT.to_string(), raw);
            }
            None => {
                self.values.remove(KEY_RATE_LIMIT);
            }
        }
        Ok(())
    }

    async fn widget_enabled(&self) -> StoreResult<Option<bool>> {
        Ok(self
            .values
            .get(KEY_WIDGET_ENABLED)
            .map(|v| v.as_str() == "true"))
    }

    async fn set_widget_enabled(&self, enabled: bool) -> StoreResult<()> {
        self.values
            .insert(KEY_WIDGET_ENABLED.to_string(), enabled.to_string());
        Ok(())
    }

    async fn site_enabled(&self, tag: SiteTag) -> StoreResult<Option<bool>> {
        Ok(self
            .values
            .get(&site_key(tag))
            .map(|v| v.as_str() == "true"))
    }

    async fn set_site_enabled(&self, tag: SiteTag, enabled: bool) -> StoreResult<()> {
        self.values.insert(site_key(tag), enabled.to_string());
        Ok(())
    }
}
