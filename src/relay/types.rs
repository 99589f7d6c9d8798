//! Wire types for the privileged relay channel and the copilot API.

use serde::{Deserialize, Serialize};

use crate::extract::{PageContent, PageContext};

/// Request kinds carried over the relay channel to the privileged side.
///
/// The page-context side of the widget has no direct network egress; every
/// HTTP call is described as data and executed by the intermediary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelRequest {
    /// Proxy one HTTP request.
    #[serde(rename_all = "camelCase")]
    ProxyRequest {
        /// Absolute URL to call.
        endpoint: String,
        /// HTTP method.
        method: String,
        /// Request headers.
        headers: Vec<(String, String)>,
        /// Request body, if any.
        body: Option<String>,
    },
}

/// Response shapes the privileged side can return.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelResponse {
    /// The request reached the server; `data` is the raw response body.
    /// `status` may still be a non-success code.
    Data {
        /// Raw response body.
        data: String,
        /// HTTP status code.
        status: u16,
    },
    /// The request failed before a response body was available.
    Failure {
        /// Failure description.
        error: String,
        /// HTTP status code, when one was observed.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

/// JSON body of a copilot API call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopilotRequest<'a> {
    /// The user's (or synthesized) message.
    pub message: &'a str,
    /// Normalized page URL.
    pub url: &'a str,
    /// Extracted page content.
    pub page_content: &'a PageContent,
    /// Site tag, when recognized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_type: Option<&'a str>,
    /// Whether the readiness probe completed before extraction.
    pub fully_loaded: bool,
    /// Client identity token.
    pub wallet: String,
}

impl<'a> CopilotRequest<'a> {
    /// Build a request from a message and its page context.
    #[must_use]
    pub fn new(message: &'a str, context: &'a PageContext, wallet: String) -> Self {
        Self {
            message,
            url: &context.url,
            page_content: &context.content,
            page_type: context.site_tag.map(crate::classify::SiteTag::as_str),
            fully_loaded: context.fully_loaded,
            wallet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_request_wire_format() {
        let request = ChannelRequest::ProxyRequest {
            endpoint: "https://api.test/copilot".into(),
            method: "POST".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some("{}".into()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "proxyRequest");
        assert_eq!(json["endpoint"], "https://api.test/copilot");
    }

    #[test]
    fn test_channel_response_variants() {
        let data: ChannelResponse =
            serde_json::from_str(r#"{"data":"hello","status":200}"#).unwrap();
        assert_eq!(
            data,
            ChannelResponse::Data {
                data: "hello".into(),
                status: 200
            }
        );

        let failure: ChannelResponse =
            serde_json::from_str(r#"{"error":"timeout"}"#).unwrap();
        assert_eq!(
            failure,
            ChannelResponse::Failure {
                error: "timeout".into(),
                status: None
            }
        );
    }

    #[test]
    fn test_copilot_request_field_names() {
        let context = PageContext {
            url: "https://dexscreener.com/solana/abc".into(),
            site_tag: Some(crate::classify::SiteTag::Dexscreener),
            fully_loaded: true,
            content: PageContent::default(),
        };
        let request = CopilotRequest::new("hi", &context, "cafe0123".into());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["pageType"], "dexscreener");
        assert_eq!(json["fullyLoaded"], true);
        assert_eq!(json["wallet"], "cafe0123");
        assert!(json.get("pageContent").is_some());
    }
}
