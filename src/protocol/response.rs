//! Incoming completion payloads: full responses, streamed chunks and error bodies.

use serde::Deserialize;

use crate::client::types::Completion;
use crate::types::message::{Citation, MessageContent};
use crate::types::tool::ToolCall;
use crate::{Error, ErrorContext, Result};

/// Non-streaming `/chat/completions` response body.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    /// Search-backed providers attach source URLs at the top level.
    #[serde(default)]
    pub citations: Vec<CitationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallPayload {
    #[serde(default)]
    pub id: String,
    pub function: FunctionPayload,
}

#[derive(Debug, Deserialize)]
pub struct FunctionPayload {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CitationEntry {
    Url(String),
    Detailed {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl From<CitationEntry> for Citation {
    fn from(entry: CitationEntry) -> Self {
        match entry {
            CitationEntry::Url(url) => Citation::new(url),
            CitationEntry::Detailed { url, title } => Citation { url, title },
        }
    }
}

impl ChatCompletionResponse {
    /// Take the first choice as the exchange result.
    pub fn into_completion(self) -> Result<Completion> {
        let mut choices = self.choices.into_iter();
        let choice = choices.next().ok_or_else(|| {
            Error::runtime_with_context(
                "response contained no choices",
                ErrorContext::new()
                    .with_field_path("choices")
                    .with_source("response_decoder"),
            )
        })?;

        // Tool-call-only answers come back with a null content.
        let content = choice
            .message
            .content
            .unwrap_or_else(|| MessageContent::text(""));

        Ok(Completion {
            content,
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(ToolCallPayload::into_tool_call)
                .collect(),
            citations: self.citations.into_iter().map(Citation::from).collect(),
            finish_reason: choice.finish_reason,
            usage: self.usage,
        })
    }
}

impl ToolCallPayload {
    pub fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            name: self.function.name,
            arguments: parse_arguments(&self.function.arguments),
        }
    }
}

/// Arguments that parse as JSON are kept parsed; anything else stays a raw string.
pub(crate) fn parse_arguments(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::Value::String(String::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// One streamed `data:` payload.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    /// Kept as a string: providers occasionally announce roles we do not model.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallChunk>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionChunk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// OpenAI-style error object.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ApiError {
    pub fn describe(&self) -> String {
        match (&self.message, &self.kind) {
            (Some(m), Some(k)) => format!("{} ({})", m, k),
            (Some(m), None) => m.clone(),
            (None, Some(k)) => k.clone(),
            (None, None) => self
                .code
                .as_ref()
                .map(|c| format!("error code {}", c))
                .unwrap_or_else(|| "unspecified server error".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Extract a readable message from a non-success response body.
pub fn error_message_from_body(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        return envelope.error.describe();
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}…", cut)
    } else {
        trimmed.to_string()
    }
}
