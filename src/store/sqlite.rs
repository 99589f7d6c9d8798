//! SQLite-backed storage backend.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::chat::RateLimitState;
use crate::classify::SiteTag;

use super::{
    KEY_IDENTITY, KEY_RATE_LIMIT, KEY_WIDGET_ENABLED, MessageStore, StateStore, StoreResult,
    StoredMessage, site_key,
};

/// SQLite implementation of [`MessageStore`] and [`StateStore`].
pub struct SqliteStore {
    conn: Arc<Connection>,
    history_limit: usize,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub async fn open(path: impl AsRef<Path>, history_limit: usize) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref().to_path_buf()).await?;
        Self::with_connection(conn, history_limit).await
    }

    /// Open an in-memory store (tests, ephemeral sessions).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory(history_limit: usize) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn, history_limit).await
    }

    async fn with_connection(conn: Connection, history_limit: usize) -> StoreResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    content TEXT NOT NULL,
                    from_user INTEGER NOT NULL,
                    timestamp_ms INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_messages_url
                    ON messages (url, id);
                CREATE TABLE IF NOT EXISTS widget_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn: Arc::new(conn),
            history_limit,
        })
    }

    async fn get_value(&self, key: &'static str) -> StoreResult<Option<String>> {
        self.get_value_owned(key.to_string()).await
    }

    async fn get_value_owned(&self, key: String) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM widget_state WHERE key = ?1",
                        rusqlite::params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    async fn set_value(&self, key: String, value: String) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO widget_state (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn remove_value(&self, key: &'static str) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM widget_state WHERE key = ?1",
                    rusqlite::params![key],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, url: &str, message: StoredMessage) -> StoreResult<()> {
        let url = url.to_string();
        let limit = i64::try_from(self.history_limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO messages (url, content, from_user, timestamp_ms)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        url,
                        message.content,
                        i32::from(message.from_user),
                        message.timestamp_ms
                    ],
                )?;
                // Enforce the per-conversation cap, oldest rows first.
                conn.execute(
                    "DELETE FROM messages
                     WHERE url = ?1 AND id NOT IN (
                         SELECT id FROM messages
                         WHERE url = ?1
                         ORDER BY id DESC
                         LIMIT ?2
                     )",
                    rusqlite::params![url, limit],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn load_all(&self, url: &str) -> StoreResult<Vec<StoredMessage>> {
        let url = url.to_string();
        let messages = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT content, from_user, timestamp_ms FROM messages
                     WHERE url = ?1
                     ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![url], |row| {
                        Ok(StoredMessage {
                            content: row.get(0)?,
                            from_user: row.get::<_, i32>(1)? != 0,
                            timestamp_ms: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(messages)
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn identity(&self) -> StoreResult<Option<String>> {
        self.get_value(KEY_IDENTITY).await
    }

    async fn set_identity(&self, token: &str) -> StoreResult<()> {
        self.set_value(KEY_IDENTITY.to_string(), token.to_string())
            .await
    }

    async fn rate_limit(&self) -> StoreResult<Option<RateLimitState>> {
        match self.get_value(KEY_RATE_LIMIT).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_rate_limit(&self, state: Option<RateLimitState>) -> StoreResult<()> {
        match state {
            Some(state) => {
                let raw = serde_json::to_string(&state)?;
                self.set_value(KEY_RATE_LIMIT.to_string(), raw).await
            }
            None => self.remove_value(KEY_RATE_LIMIT).await,
        }
    }

    async fn widget_enabled(&self) -> StoreResult<Option<bool>> {
        Ok(self
            .get_value(KEY_WIDGET_ENABLED)
            .await?
            .map(|v| v == "true"))
    }

    async fn set_widget_enabled(&self, enabled: bool) -> StoreResult<()> {
        self.set_value(KEY_WIDGET_ENABLED.to_string(), enabled.to_string())
            .await
    }

    async fn site_enabled(&self, tag: SiteTag) -> StoreResult<Option<bool>> {
        Ok(self.get_value_owned(site_key(tag)).await?.map(|v| v == "true"))
    }

    async fn set_site_enabled(&self, tag: SiteTag, enabled: bool) -> StoreResult<()> {
        self.set_value(site_key(tag), enabled.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_roundtrip_in_order() {
        let store = SqliteStore::open_in_memory(200).await.unwrap();
        let url = "https://dexscreener.com/solana/abc";

        store
            .append(url, StoredMessage::new("hello", true))
            .await
            .unwrap();
        store
            .append(url, StoredMessage::new("hi there", false))
            .await
            .unwrap();

        let messages = store.load_all(url).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert!(messages[0].from_user);
        assert_eq!(messages[1].content, "hi there");
        assert!(!messages[1].from_user);
    }

    #[tokio::test]
    async fn test_history_limit_enforced() {
        let store = SqliteStore::open_in_memory(2).await.unwrap();
        let url = "https://x.com/someuser";

        for i in 0..4 {
            store
                .append(url, StoredMessage::new(format!("m{i}"), false))
                .await
                .unwrap();
        }

        let messages = store.load_all(url).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = SqliteStore::open_in_memory(200).await.unwrap();
        store
            .append("https://a.test/", StoredMessage::new("a", true))
            .await
            .unwrap();
        store
            .append("https://b.test/", StoredMessage::new("b", true))
            .await
            .unwrap();

        let a = store.load_all("https://a.test/").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "a");
    }

    #[tokio::test]
    async fn test_state_roundtrip() {
        let store = SqliteStore::open_in_memory(200).await.unwrap();

        assert!(store.identity().await.unwrap().is_none());
        store.set_identity("abcd1234").await.unwrap();
        assert_eq!(store.identity().await.unwrap().as_deref(), Some("abcd1234"));

        let state = RateLimitState {
            started_at_ms: 10,
            ends_at_ms: 20,
        };
        store.set_rate_limit(Some(state.clone())).await.unwrap();
        assert_eq!(store.rate_limit().await.unwrap(), Some(state));
        store.set_rate_limit(None).await.unwrap();
        assert!(store.rate_limit().await.unwrap().is_none());

        store.set_widget_enabled(true).await.unwrap();
        assert_eq!(store.widget_enabled().await.unwrap(), Some(true));
        store
            .set_site_enabled(SiteTag::Dexscreener, false)
            .await
            .unwrap();
        assert_eq!(
            store.site_enabled(SiteTag::Dexscreener).await.unwrap(),
            Some(false)
        );
    }
}
