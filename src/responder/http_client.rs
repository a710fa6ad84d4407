//! HTTP client of the chat function.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};
use url::Url;

use crate::core::config::{BackendConfig, ResponderConfig};
use crate::core::errors::{ChatError, ChatResult};

use super::{ChatReply, ChatRequest, Responder, ResponderFuture};

/// Path of the chat function under the backend base URL.
pub const CHAT_FUNCTION_PATH: &str = "functions/v1/chat";

/// Responder that posts each message to a remote chat function.
pub struct HttpResponder {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl HttpResponder {
    /// Create a client for the chat function under `base_url`.
    ///
    /// # Errors
    /// Returns an error if the token is not a valid header value or the
    /// client cannot be built.
    pub fn new(base_url: &Url, token: &str, timeout: Duration) -> ChatResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| ChatError::InvalidConfig(format!("invalid bearer token: {err}")))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let base = base_url.as_str().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/{CHAT_FUNCTION_PATH}"))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    /// Create a client from the backend and responder sections.
    ///
    /// # Errors
    /// Returns an error if the backend URL is missing or invalid.
    pub fn from_config(backend: &BackendConfig, responder: &ResponderConfig) -> ChatResult<Self> {
        Self::new(&backend.base_url()?, &backend.anon_key, responder.timeout())
    }

    /// Full URL of the chat function.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Responder for HttpResponder {
    fn respond(&self, request: ChatRequest) -> ResponderFuture<'_> {
        Box::pin(async move {
            debug!("Calling chat function at {}", self.endpoint);
            let response = self
                .http_client
                .post(self.endpoint.clone())
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read response body".to_string());
                warn!("Chat function returned {}", status);
                return Err(ChatError::ResponderStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            let reply: ChatReply = response.json().await.map_err(|err| {
                ChatError::Responder(format!("undecodable chat function reply: {err}"))
            })?;
            Ok(reply)
        })
    }
}
