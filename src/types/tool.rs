//! Tool calling types.

use serde::{Deserialize, Serialize};

/// Tool call (invocation from model)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed JSON when the model produced valid JSON, otherwise the raw argument string.
    pub arguments: serde_json::Value,
}

/// A fragment of a tool call as it arrives in a streamed chunk.
///
/// The first fragment for an index usually carries `id` and `name`; later ones
/// only append to `arguments`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
