use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Proxy;
use std::time::Duration;
use tracing::debug;

use crate::config::ChatConfig;
use crate::transport::lines::into_lines;
use crate::transport::{
    HttpRequest, HttpResponse, StreamingResponse, Transport, TransportError,
};
use crate::{Error, ErrorContext, Result};

/// reqwest-backed [`Transport`].
///
/// Only the connect timeout and, for buffered calls, the request timeout are set on
/// the client. Stream read deadlines are enforced by the dispatcher.
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            // Conservative HTTP/2 keepalive defaults for long-lived streams.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    "invalid proxy url",
                    ErrorContext::new()
                        .with_field_path("proxy_url")
                        .with_details(e.to_string())
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
        })
    }

    /// Override the whole-request timeout of buffered calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut req = self.client.post(&request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        // After the headers: `json` only sets content-type when it is absent.
        req.json(&request.body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .build(&request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(TransportError::Http)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::Http)?;
        debug!(http_status = status, body_len = body.len(), "buffered response received");
        Ok(HttpResponse { status, body })
    }

    async fn post_streaming(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let response = self
            .build(&request)
            .send()
            .await
            .map_err(TransportError::Http)?;
        let status = response.status().as_u16();
        debug!(http_status = status, "stream opened");

        let bytes = response
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(StreamingResponse {
            status,
            lines: into_lines(bytes),
        })
    }
}
