//! Event mapping (parsed chunk -> StreamEvent)

use tracing::debug;

use crate::protocol::ChatCompletionChunk;
use crate::types::events::StreamEvent;
use crate::types::message::MessageRole;
use crate::types::tool::ToolCallFragment;

/// Map one parsed chunk to events, in a fixed order: role, content, tool calls.
///
/// Only the first choice is considered. An in-band `error` object wins over
/// everything else in the chunk.
pub fn map_chunk(chunk: ChatCompletionChunk) -> Vec<StreamEvent> {
    if let Some(err) = chunk.error {
        return vec![StreamEvent::ProtocolError {
            message: err.describe(),
        }];
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        // Usage-only or keep-alive frames.
        return Vec::new();
    };
    let delta = choice.delta;
    let mut events = Vec::with_capacity(1 + delta.tool_calls.len());

    if let Some(role) = delta.role.as_deref() {
        match parse_role(role) {
            Some(role) => events.push(StreamEvent::RoleAnnounced { role }),
            None => debug!(role, "ignoring unknown role in stream chunk"),
        }
    }

    // Providers send `""` alongside the role announcement and around tool calls.
    if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
        events.push(StreamEvent::ContentDelta { text });
    }

    for tc in delta.tool_calls {
        let (name, arguments) = match tc.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        events.push(StreamEvent::ToolCallDelta {
            index: tc.index,
            partial: ToolCallFragment {
                id: tc.id,
                name,
                arguments,
            },
        });
    }

    events
}

fn parse_role(role: &str) -> Option<MessageRole> {
    match role {
        "assistant" => Some(MessageRole::Assistant),
        "user" => Some(MessageRole::User),
        "system" => Some(MessageRole::System),
        _ => None,
    }
}
