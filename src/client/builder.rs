use std::sync::Arc;
use std::time::Duration;

use crate::client::core::ChatClient;
use crate::config::ChatConfig;
use crate::transport::{HttpTransport, Transport};
use crate::Result;

/// Builder for creating clients with custom configuration.
///
/// Programmatic overrides win over the configuration they are layered on.
#[derive(Default)]
pub struct ChatClientBuilder {
    config: Option<ChatConfig>,
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl ChatClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit configuration instead of the defaults.
    pub fn config(mut self, config: ChatConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override base URL (mock servers, local gateways).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Use this key instead of the keyring / environment lookup.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Wall-clock deadline for non-streaming exchanges.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Per-read deadline for streaming exchanges.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Replace the reqwest transport, e.g. with a scripted one in tests.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ChatClient> {
        let mut config = self.config.unwrap_or_default();
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }
        config.validate()?;

        let api_key = config.resolve_api_key();
        let request_timeout = self.request_timeout.unwrap_or_else(|| config.request_timeout());
        let read_timeout = self.read_timeout.unwrap_or_else(|| config.read_timeout());
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            // Buffered calls share the dispatcher's deadline.
            None => Arc::new(HttpTransport::new(&config)?.with_request_timeout(request_timeout)),
        };

        Ok(ChatClient {
            request_timeout,
            read_timeout,
            api_key,
            transport,
            config: Arc::new(config),
        })
    }
}
