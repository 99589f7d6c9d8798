//! HTTP-backed relay channel.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::error::RelayError;
use super::types::{ChannelRequest, ChannelResponse};
use super::RelayChannel;

/// Executes proxied requests with a shared HTTP client. This is the
/// privileged side of the channel in hosts that have direct network
/// egress.
pub struct HttpChannel {
    client: reqwest::Client,
}

impl HttpChannel {
    /// Create a channel with its own client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self { client })
    }

    /// Create a channel over an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RelayChannel for HttpChannel {
    async fn send(&self, request: ChannelRequest) -> Result<ChannelResponse, RelayError> {
        let ChannelRequest::ProxyRequest {
            endpoint,
            method,
            headers,
            body,
        } = request;

        let method =
            reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::POST);

        let mut header_map = HeaderMap::new();
        for (name, value) in &headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                header_map.insert(name, value);
            }
        }

        let mut builder = self.client.request(method, &endpoint).headers(header_map);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let data = response.text().await?;

        Ok(ChannelResponse::Data { data, status })
    }
}
