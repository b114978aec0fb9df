//! Outgoing chat completion request.

use serde::Serialize;

use crate::types::message::{Message, MessageContent, MessageRole};
use crate::Result;

/// Request payload for one exchange, built from an owned snapshot of the conversation.
///
/// Owning the messages means later edits of the live conversation cannot leak
/// into a request that is already in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Provider model id (e.g. "gpt-4o-mini", "deepseek-chat")
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl ChatRequest {
    /// Render the JSON body sent to `/chat/completions`.
    pub fn to_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(WireRequest::from(self))?)
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a MessageContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    arguments: String,
}

impl<'a> From<&'a ChatRequest> for WireRequest<'a> {
    fn from(req: &'a ChatRequest) -> Self {
        WireRequest {
            model: &req.model,
            messages: req.messages.iter().map(WireMessage::from).collect(),
            stream: req.stream,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            top_p: req.top_p,
        }
    }
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        WireMessage {
            role: msg.role(),
            content: msg.content(),
            tool_calls: msg
                .tool_calls()
                .iter()
                .map(|tc| WireToolCall {
                    id: &tc.id,
                    kind: "function",
                    function: WireFunction {
                        name: &tc.name,
                        // The API expects arguments as a JSON-encoded string.
                        arguments: match &tc.arguments {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect(),
        }
    }
}
