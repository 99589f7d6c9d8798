//! Server-signaled cool-down window shared across all pages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Persisted cool-down window after a rate-limited relay call.
///
/// Present only while the client is cooling down; cleared once
/// `now >= ends_at_ms`. Keyed by client identity, not by page, so a single
/// window covers the whole browsing session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// When the cool-down started, in milliseconds since Unix epoch.
    pub started_at_ms: i64,
    /// When the cool-down ends, in milliseconds since Unix epoch.
    pub ends_at_ms: i64,
}

impl RateLimitState {
    /// Open a cool-down window starting at `now_ms`.
    #[must_use]
    pub fn begin(now_ms: i64, window: Duration) -> Self {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        Self {
            started_at_ms: now_ms,
            ends_at_ms: now_ms.saturating_add(window_ms),
        }
    }

    /// Whether the window has elapsed at `now_ms`.
    #[must_use]
    pub const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.ends_at_ms
    }

    /// Remaining time rounded up to whole hours, never below one while the
    /// window is still active.
    #[must_use]
    pub fn remaining_hours(&self, now_ms: i64) -> i64 {
        let remaining = self.ends_at_ms.saturating_sub(now_ms);
        if remaining <= 0 {
            return 0;
        }
        // remaining is positive here, so this is ceiling division.
        (remaining - 1) / HOUR_MS + 1
    }

    /// Advisory message shown in place of a reply while cooling down.
    #[must_use]
    pub fn advisory_text(&self, now_ms: i64) -> String {
        let hours = self.remaining_hours(now_ms).max(1);
        let unit = if hours == 1 { "hour" } else { "hours" };
        format!(
            "I've hit my request limit for now. Please check back in about {hours} {unit}."
        )
    }
}
