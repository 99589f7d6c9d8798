//! Configuration for the PagePilot widget engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the widget pipeline.
///
/// Runtime toggles (global enable, per-site activation) are persisted in the
/// [`crate::store::StateStore`]; this struct only supplies their defaults and
/// the timing parameters of the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Base URL of the remote copilot API.
    pub api_base: String,
    /// Whether the widget is active when no persisted preference exists.
    pub default_enabled: bool,
    /// Maximum time to wait for required page elements before extracting.
    #[serde(with = "duration_ms_serde")]
    pub readiness_timeout: Duration,
    /// Interval between readiness probe attempts.
    #[serde(with = "duration_ms_serde")]
    pub readiness_poll_interval: Duration,
    /// Cool-down window applied after a rate-limited relay call.
    #[serde(with = "duration_ms_serde")]
    pub rate_limit_window: Duration,
    /// Cadence of the periodic rate-limit expiry check.
    #[serde(with = "duration_ms_serde")]
    pub rate_limit_check_interval: Duration,
    /// Maximum number of stored messages per conversation.
    pub history_limit: usize,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.pagepilot.dev".to_string(),
            default_enabled: true,
            readiness_timeout: Duration::from_millis(5000),
            readiness_poll_interval: Duration::from_millis(500),
            rate_limit_window: Duration::from_secs(4 * 60 * 60),
            rate_limit_check_interval: Duration::from_secs(60),
            history_limit: 200,
        }
    }
}

impl WidgetConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the copilot API base URL.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Set whether the widget is enabled by default.
    #[must_use]
    pub const fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Set the readiness probe timeout.
    #[must_use]
    pub const fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Set the readiness probe poll interval.
    #[must_use]
    pub const fn with_readiness_poll_interval(mut self, interval: Duration) -> Self {
        self.readiness_poll_interval = interval;
        self
    }

    /// Set the rate-limit cool-down window.
    #[must_use]
    pub const fn with_rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    /// Set the per-conversation history cap.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

/// Serde module for millisecond `Duration` serialization.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
