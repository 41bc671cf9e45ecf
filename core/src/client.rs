use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ChatConfig;
use crate::errors::{ChatError, ChatResult};
use crate::stream::ByteStream;
use crate::types::{Answer, BackendConfig, ChatAppResponse, ChatRequest};

const UNKNOWN_ERROR: &str = "Unknown error";

/// What the backend sent back for a chat request
pub enum ChatReply {
    /// Non-streaming: the whole answer at once
    Complete(Answer),
    /// Streaming: newline-delimited JSON events
    Stream(ByteStream),
}

impl fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatReply::Complete(answer) => f.debug_tuple("Complete").field(answer).finish(),
            ChatReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The chat backend as seen by a session
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest, token: Option<&str>) -> ChatResult<ChatReply>;

    async fn config(&self, token: Option<&str>) -> ChatResult<BackendConfig>;
}

/// HTTP client for the retrieval-augmented chat backend
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    /// Create a new backend client
    pub fn new(config: &ChatConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs()))
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.backend_url().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn with_auth(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Error for a failed call, using the body's `error` field when there is one
pub(crate) fn protocol_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
    ChatError::Protocol {
        status: status.as_u16(),
        message,
    }
}

/// Decode a non-streaming chat body
pub(crate) fn parse_chat_body(status: StatusCode, body: &str) -> ChatResult<Answer> {
    let value: Value = serde_json::from_str(body).map_err(|_| protocol_error(status, body))?;
    if value.get("error").is_some() {
        return Err(protocol_error(status, body));
    }
    let response: ChatAppResponse =
        serde_json::from_value(value).map_err(|_| protocol_error(status, body))?;
    response.into_answer().ok_or_else(|| ChatError::Protocol {
        status: status.as_u16(),
        message: "No choices in response".to_string(),
    })
}

#[async_trait]
impl ChatBackend for ChatClient {
    #[instrument(skip(self, request, token), fields(stream = request.stream, messages = request.messages.len()))]
    async fn chat(&self, request: &ChatRequest, token: Option<&str>) -> ChatResult<ChatReply> {
        let url = self.endpoint("chat");
        let response = Self::with_auth(self.client.post(&url).json(request), token)
            .send()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        debug!(%status, "Chat response headers received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(protocol_error(status, &body));
        }

        if request.stream {
            let body = response.bytes_stream().map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ChatError::Network(format!("Failed to read response stream: {}", e)))
            });
            return Ok(ChatReply::Stream(Box::pin(body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to read response body: {}", e)))?;
        parse_chat_body(status, &body).map(ChatReply::Complete)
    }

    #[instrument(skip(self, token))]
    async fn config(&self, token: Option<&str>) -> ChatResult<BackendConfig> {
        let url = self.endpoint("config");
        let response = Self::with_auth(self.client.get(&url), token)
            .send()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to fetch config: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to read config body: {}", e)))?;
        if !status.is_success() {
            return Err(protocol_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|_| protocol_error(status, &body))
    }
}
