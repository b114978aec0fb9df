//! 传输层模块：向 OpenAI 兼容端点发送 HTTP 请求。
//!
//! The transport is the only place that touches the network. The dispatcher talks to
//! it through the [`Transport`] trait so tests can script responses without a server.

pub mod http;
pub mod lines;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BoxStream, Result};

pub use http::HttpTransport;

/// One outgoing POST.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response whose body is consumed lazily, line by line.
///
/// Dropping `lines` closes the underlying connection.
pub struct StreamingResponse {
    pub status: u16,
    pub lines: BoxStream<'static, String>,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and buffer the whole body.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send the request and return as soon as the status line is known.
    async fn post_streaming(&self, request: HttpRequest) -> Result<StreamingResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Other(String),
}
