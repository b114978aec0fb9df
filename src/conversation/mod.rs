//! 对话模块：消息列表、持久化接口与编排器。
//!
//! # Conversation Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Conversation`] | Ordered message list with a stable id |
//! | [`Orchestrator`] | Folds exchange updates into the conversation |
//! | [`ConversationStore`] | Persistence seam, see [`store`] |

pub mod orchestrator;
pub mod store;

pub use orchestrator::{Orchestrator, CANCELLED_MARKER, ERROR_MARKER, PLACEHOLDER_TEXT};
pub use store::{noop_store, ConversationStore, InMemoryStore, NoopStore};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::message::Message;
use crate::{Error, ErrorContext, Result};

/// Insertion-ordered message list.
///
/// The only mutations are append, replace-at-index and remove-at-index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Conversation {
    /// Empty conversation with a fresh UUID v4 id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    pub fn from_messages(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            messages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn replace(&mut self, index: usize, message: Message) -> Result<()> {
        let len = self.messages.len();
        let slot = self
            .messages
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        *slot = message;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Message> {
        if index >= self.messages.len() {
            return Err(out_of_range(index, self.messages.len()));
        }
        Ok(self.messages.remove(index))
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::validation_with_context(
        "message index out of range",
        ErrorContext::new()
            .with_field_path(format!("messages[{}]", index))
            .with_details(format!("conversation has {} messages", len))
            .with_source("conversation"),
    )
}
