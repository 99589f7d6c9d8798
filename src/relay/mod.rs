//! The copilot API client and its typed relay contract.
//!
//! The widget runs in a sandboxed page context without direct network
//! egress, so every API call travels as a [`ChannelRequest`] over an
//! abstract [`RelayChannel`] to a privileged intermediary. [`HttpChannel`]
//! is the real implementation; tests substitute a mock.

pub mod error;
pub mod http;
pub mod types;

pub use error::RelayError;
pub use http::HttpChannel;
pub use types::{ChannelRequest, ChannelResponse, CopilotRequest};

use std::sync::Arc;

use async_trait::async_trait;

use crate::extract::PageContext;
use crate::identity::IdentityService;

/// Path of the copilot endpoint under the API base.
pub const COPILOT_PATH: &str = "/copilot";

/// Asynchronous message-passing channel to the privileged side.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    /// Send one request and await its structured response.
    async fn send(&self, request: ChannelRequest) -> Result<ChannelResponse, RelayError>;
}

/// Client for the remote copilot API.
#[derive(Clone)]
pub struct ApiRelay {
    channel: Arc<dyn RelayChannel>,
    identity: IdentityService,
    base: String,
}

impl ApiRelay {
    /// Create a relay posting to `base` through `channel`.
    #[must_use]
    pub fn new(
        channel: Arc<dyn RelayChannel>,
        identity: IdentityService,
        base: impl Into<String>,
    ) -> Self {
        let base = base.into();
        Self {
            channel,
            identity,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Ask the copilot about the current page.
    ///
    /// The identity token is attached to every payload. The response body
    /// is plain text (not JSON) and is returned verbatim.
    ///
    /// # Errors
    /// [`RelayError::RateLimited`] when the server signals throttling
    /// (status 429 or a rate-limit-flavored failure), [`RelayError::Server`]
    /// for other non-success statuses, [`RelayError::Channel`] or
    /// [`RelayError::Http`] for transport failures.
    pub async fn ask(&self, message: &str, context: &PageContext) -> Result<String, RelayError> {
        let wallet = self.identity.get_or_create().await;
        let payload = CopilotRequest::new(message, context, wallet);
        let body = serde_json::to_string(&payload)?;

        let request = ChannelRequest::ProxyRequest {
            endpoint: format!("{}{COPILOT_PATH}", self.base),
            method: "POST".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
        };

        match self.channel.send(request).await? {
            ChannelResponse::Data { data, status } => match status {
                200..=299 => Ok(data),
                429 => Err(RelayError::RateLimited),
                status => {
                    tracing::warn!(status, "copilot call failed");
                    Err(RelayError::Server { status })
                }
            },
            ChannelResponse::Failure { error, status } => {
                if status == Some(429) || is_rate_limit_message(&error) {
                    Err(RelayError::RateLimited)
                } else {
                    Err(RelayError::Channel(error))
                }
            }
        }
    }
}

/// Whether a channel failure string signals throttling.
fn is_rate_limit_message(error: &str) -> bool {
    let lowered = error.to_lowercase();
    lowered.contains("rate limit") || lowered.contains("too many requests")
}
