//! 类型系统模块：定义对话核心的基础数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that flows through an exchange.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Conversation turn with role and content |
//! | [`MessageContent`] | Plain text or non-empty multi-part content |
//! | [`StreamEvent`] | Decoded streaming event |
//! | [`ToolCall`] | Function/tool call from model response |
//! | [`ErrorOutcome`] | Classified, user-facing failure |
//!
//! ## Example
//!
//! ```rust
//! use ai_chat_core::types::{ContentPart, Message, MessageContent, MessageRole};
//!
//! let system = Message::system("You are a helpful assistant");
//! let user = Message::new(
//!     MessageRole::User,
//!     MessageContent::parts(vec![
//!         ContentPart::text("What is in this picture?"),
//!         ContentPart::image_url("https://example.com/cat.png"),
//!     ])?,
//! );
//! assert!(user.contains_image());
//! # Ok::<(), ai_chat_core::Error>(())
//! ```

pub mod events;
pub mod message;
pub mod outcome;
pub mod tool;

pub use events::StreamEvent;
pub use message::{Citation, ContentPart, ContentParts, ImageSource, Message, MessageContent, MessageRole};
pub use outcome::ErrorOutcome;
pub use tool::{ToolCall, ToolCallFragment};
