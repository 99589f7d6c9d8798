//! Error types for the relay module.

use thiserror::Error;

/// Errors from the relay channel and the copilot API.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport-level failure in the channel.
    #[error("relay transport failure: {0}")]
    Channel(String),

    /// HTTP request failed before a response arrived.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API responded with a non-success status.
    #[error("server returned status {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The API signaled request throttling. Drives the rate-limit
    /// cool-down state machine rather than the generic error path.
    #[error("request rate limit reached")]
    RateLimited,

    /// Request payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Whether this error should open a rate-limit cool-down window.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
