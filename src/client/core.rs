use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::builder::ChatClientBuilder;
use crate::client::chat::ExchangeOptions;
use crate::client::dispatcher::Dispatcher;
use crate::config::ChatConfig;
use crate::transport::{HttpRequest, Transport};
use crate::Result;

/// Client for one OpenAI-compatible endpoint.
///
/// Cheap to clone; clones share the transport and its connection pool.
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) config: Arc<ChatConfig>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) api_key: Option<String>,
    pub(crate) request_timeout: Duration,
    pub(crate) read_timeout: Duration,
}

impl ChatClient {
    /// Build a client on the reqwest transport from a configuration.
    pub fn new(config: ChatConfig) -> Result<Self> {
        ChatClientBuilder::new().config(config).build()
    }

    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::new()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Exchange options derived from the configuration.
    pub fn default_options(&self) -> ExchangeOptions {
        ExchangeOptions::from_config(&self.config)
    }

    /// A dispatcher with its own single-exchange slot.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn build_http_request(
        &self,
        body: serde_json::Value,
        streaming: bool,
        request_id: &str,
    ) -> HttpRequest {
        let accept = if streaming {
            "text/event-stream"
        } else {
            "application/json"
        };
        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), accept.to_string()),
            ("x-request-id".to_string(), request_id.to_string()),
        ];
        if let Some(key) = &self.api_key {
            headers.push(("authorization".to_string(), format!("Bearer {}", key)));
        }
        for (name, value) in &self.config.headers {
            headers.push((name.clone(), value.clone()));
        }

        HttpRequest {
            url: self.config.endpoint_url(),
            headers,
            body,
        }
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}
