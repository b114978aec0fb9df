//! 配置模块：端点、模型与超时设置。
//!
//! Configuration is read from YAML, then overridden by environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AI_CHAT_BASE_URL` | `base_url` |
//! | `AI_CHAT_MODEL` | `model` |
//! | `AI_HTTP_TIMEOUT_SECS` / `AI_TIMEOUT_SECS` | `request_timeout_secs` |
//! | `AI_HTTP_READ_TIMEOUT_SECS` | `read_timeout_secs` |
//! | `AI_HTTP_CONNECT_TIMEOUT_SECS` | `connect_timeout_secs` |
//! | `AI_PROXY_URL` | `proxy_url` |

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::{Error, ErrorContext, Result};

/// Keyring service under which API keys are looked up.
pub const KEYRING_SERVICE: &str = "ai-chat-core";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Provider id, used for keyring and `<PROVIDER>_API_KEY` lookups.
    pub provider_id: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub streaming: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    /// Wall-clock deadline of a non-streaming exchange.
    pub request_timeout_secs: u64,
    /// Deadline for opening a stream and for each streamed line.
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub proxy_url: Option<String>,
    pub pool_max_idle_per_host: usize,
    /// Give up on a stream after this many consecutive unparseable chunks.
    pub max_consecutive_malformed: Option<usize>,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            streaming: true,
            max_tokens: None,
            temperature: None,
            top_p: None,
            request_timeout_secs: 300,
            read_timeout_secs: 60,
            connect_timeout_secs: 10,
            proxy_url: None,
            pool_max_idle_per_host: 32,
            max_consecutive_malformed: None,
            headers: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("provider_id", &self.provider_id)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("streaming", &self.streaming)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("proxy_url", &self.proxy_url)
            .field("max_consecutive_malformed", &self.max_consecutive_malformed)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChatConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "failed to parse configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read {}", path.display()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// File (or defaults), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("AI_CHAT_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("AI_CHAT_MODEL") {
            self.model = v;
        }
        if let Some(v) = lookup("AI_HTTP_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_secs("AI_HTTP_TIMEOUT_SECS", &v)?;
        } else if let Some(v) = lookup("AI_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_secs("AI_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("AI_HTTP_READ_TIMEOUT_SECS") {
            self.read_timeout_secs = parse_secs("AI_HTTP_READ_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("AI_HTTP_CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs = parse_secs("AI_HTTP_CONNECT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("AI_PROXY_URL") {
            self.proxy_url = Some(v);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                "invalid base url",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "base url must use http or https",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(format!("scheme: {}", parsed.scheme()))
                    .with_source("config_loader"),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "model must not be empty",
                ErrorContext::new()
                    .with_field_path("model")
                    .with_source("config_loader"),
            ));
        }
        for (field, value) in [
            ("request_timeout_secs", self.request_timeout_secs),
            ("read_timeout_secs", self.read_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::configuration_with_context(
                    "timeout must be positive",
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("config_loader"),
                ));
            }
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Name of the environment variable holding this provider's key.
    pub fn api_key_env_var(&self) -> String {
        format!("{}_API_KEY", self.provider_id.to_uppercase().replace('-', "_"))
    }

    /// Explicit config, then the OS keyring, then `<PROVIDER>_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }

        if let Ok(entry) = Entry::new(KEYRING_SERVICE, &self.provider_id) {
            if let Ok(key) = entry.get_password() {
                debug!(provider = %self.provider_id, "api key loaded from keyring");
                return Some(key);
            }
        }

        std::env::var(self.api_key_env_var())
            .ok()
            .filter(|k| !k.is_empty())
    }
}

fn parse_secs(var: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        Error::configuration_with_context(
            "expected a whole number of seconds",
            ErrorContext::new()
                .with_field_path(var)
                .with_details(format!("{:?}: {}", raw, e))
                .with_source("env"),
        )
    })
}
