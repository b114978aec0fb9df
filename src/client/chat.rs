use crate::config::ChatConfig;
use crate::protocol::ChatRequest;
use crate::types::message::Message;

/// Per-exchange request parameters (small surface).
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOptions {
    pub model: String,
    pub streaming: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl ExchangeOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            streaming: true,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    /// Defaults taken from the client configuration.
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            model: config.model.clone(),
            streaming: config.streaming,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }

    /// Enable or disable streaming.
    pub fn streaming(mut self, enable: bool) -> Self {
        self.streaming = enable;
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub(crate) fn to_request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            stream: self.streaming,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}
