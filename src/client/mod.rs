//! Advisor backend client.
//!
//! [`ChatBackend::open`] issues the chat request and hands back a
//! [`ByteSource`] over the raw response body. Dropping the source closes the
//! connection, which is how an aborted session stops the transfer.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ChatConfig;
use crate::session::HistoryEntry;

/// Errors that end a stream session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Connection refused, timeout, or the body broke off mid-read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend rejected the request with a structured `detail`.
    #[error("Backend error ({status}): {detail}")]
    Backend { status: u16, detail: String },

    /// Error status without a usable `detail`.
    #[error("HTTP error: {status}")]
    Http { status: u16 },
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Prior messages, oldest first, excluding `message`.
    pub history: Vec<HistoryEntry>,
    pub language: String,
}

/// Pull-based source of response body chunks.
///
/// Yields `None` at end of stream. After an error the session is over and
/// the source is dropped.
#[async_trait]
pub trait ByteSource: Send {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>>;
}

/// Something that can start a chat response.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, StreamError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Classify an error response body.
fn error_from_response(status: u16, body: &str) -> StreamError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| match parsed.detail {
            serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
            _ => None,
        });

    match detail {
        Some(detail) => StreamError::Backend { status, detail },
        None => StreamError::Http { status },
    }
}

/// HTTP backend speaking to the advisor API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, StreamError> {
        Self::new(config.endpoint.clone(), config.connect_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, StreamError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            history = request.history.len(),
            language = %request.language,
            "Opening chat stream"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_response(status.as_u16(), &body);
            tracing::debug!(status = status.as_u16(), error = %err, "Chat request rejected");
            return Err(err);
        }

        Ok(Box::new(HttpByteSource {
            stream: Box::pin(response.bytes_stream()),
        }))
    }
}

struct HttpByteSource {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>> {
        self.stream
            .next()
            .await
            .map(|chunk| chunk.map_err(StreamError::from))
    }
}

/// Byte source fed through a channel; the stream ends when every sender is
/// dropped.
pub struct ChannelSource {
    rx: mpsc::Receiver<Result<Bytes, StreamError>>,
}

impl ChannelSource {
    pub fn new(buffer: usize) -> (mpsc::Sender<Result<Bytes, StreamError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl ByteSource for ChannelSource {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            history: vec![HistoryEntry {
                role: Role::User,
                content: "earlier".to_string(),
            }],
            language: "zh".to_string(),
        }
    }

    fn backend_for(server: &MockServer) -> HttpBackend {
        HttpBackend::new(format!("{}/api/chat", server.uri()), Duration::from_secs(5)).unwrap()
    }

    async fn drain(mut source: Box<dyn ByteSource>) -> Result<Vec<u8>, StreamError> {
        let mut body = Vec::new();
        while let Some(chunk) = source.next_chunk().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }

    // =========================================================================
    // Error classification
    // =========================================================================

    #[test]
    fn test_error_with_string_detail() {
        assert_eq!(
            error_from_response(400, r#"{"detail":"API Key not configured"}"#),
            StreamError::Backend {
                status: 400,
                detail: "API Key not configured".to_string()
            }
        );
    }

    #[test]
    fn test_error_without_usable_detail() {
        assert_eq!(error_from_response(502, "Bad Gateway"), StreamError::Http { status: 502 });
        assert_eq!(error_from_response(500, r#"{"detail":""}"#), StreamError::Http { status: 500 });
        // Validation errors carry a list, not a message
        assert_eq!(
            error_from_response(422, r#"{"detail":[{"loc":["body"],"msg":"x"}]}"#),
            StreamError::Http { status: 422 }
        );
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(request("hi")).unwrap();
        assert_eq!(json["message"], "hi");
        assert_eq!(json["language"], "zh");
        assert_eq!(json["history"][0]["role"], "user");
        assert_eq!(json["history"][0]["content"], "earlier");
    }

    // =========================================================================
    // HTTP backend
    // =========================================================================

    #[tokio::test]
    async fn test_streams_response_body() {
        let server = MockServer::start().await;
        let body = "分析中\n> 🔧 调用工具: python_repl_ast\n完成";
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(serde_json::json!({
                "message": "hi",
                "history": [{"role": "user", "content": "earlier"}],
                "language": "zh"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let source = backend_for(&server).open(&request("hi")).await.unwrap();
        let received = drain(source).await.unwrap();

        assert_eq!(String::from_utf8(received).unwrap(), body);
    }

    #[tokio::test]
    async fn test_backend_detail_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"detail": "API Key not configured"})),
            )
            .mount(&server)
            .await;

        let result = backend_for(&server).open(&request("hi")).await;
        assert_eq!(
            result.err(),
            Some(StreamError::Backend {
                status: 400,
                detail: "API Key not configured".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_plain_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let result = backend_for(&server).open(&request("hi")).await;
        assert_eq!(result.err(), Some(StreamError::Http { status: 503 }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Reserve a port, then free it so nothing is listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend =
            HttpBackend::new(format!("http://127.0.0.1:{}/api/chat", port), Duration::from_secs(2))
                .unwrap();
        let result = backend.open(&request("hi")).await;

        assert!(matches!(result.err(), Some(StreamError::Transport(_))));
    }

    #[test]
    fn test_from_config_uses_endpoint() {
        let config = ChatConfig::default();
        let backend = HttpBackend::from_config(&config).unwrap();
        assert_eq!(backend.endpoint(), "http://127.0.0.1:8000/api/chat");
    }

    // =========================================================================
    // Channel source
    // =========================================================================

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::new(4);
        tx.send(Ok(Bytes::from_static(b"a"))).await.unwrap();
        tx.send(Err(StreamError::Transport("reset".to_string())))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(source.next_chunk().await, Some(Ok(Bytes::from_static(b"a"))));
        assert!(matches!(
            source.next_chunk().await,
            Some(Err(StreamError::Transport(_)))
        ));
        assert_eq!(source.next_chunk().await, None);
    }
}
