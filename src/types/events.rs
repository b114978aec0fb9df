//! Streaming events emitted by the stream decoder.

use serde::{Deserialize, Serialize};

use crate::types::message::MessageRole;
use crate::types::tool::ToolCallFragment;

/// One decoded event of a streamed completion, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum StreamEvent {
    /// The first chunk of a response usually names the speaking role.
    RoleAnnounced { role: MessageRole },

    /// Incremental assistant text.
    ContentDelta { text: String },

    /// Partial tool call for the tool call at `index`.
    ToolCallDelta {
        index: u32,
        partial: ToolCallFragment,
    },

    /// `[DONE]` sentinel; nothing follows.
    Done,

    /// The server reported an error in-band, or the stream stopped making sense.
    ProtocolError { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::ProtocolError { .. })
    }
}
