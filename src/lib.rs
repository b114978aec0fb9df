//! # ai-chat-core
//!
//! 面向 OpenAI 兼容补全端点的对话编排核心：管理消息列表、发送请求、解码流式响应。
//!
//! Conversation core for chat front-ends talking to OpenAI-compatible
//! `/chat/completions` endpoints.
//!
//! ## Overview
//!
//! The crate keeps an ordered conversation, turns a new user message into one
//! request/response exchange, and folds the result back into the conversation:
//! streamed text replaces a placeholder turn as it arrives, and failures end up as a
//! readable assistant turn rather than an error surfaced to the caller.
//!
//! ## Core Philosophy
//!
//! - **One Exchange at a Time**: a second submit while a request is pending is rejected
//! - **Streaming-First**: Server-Sent Events are decoded incrementally and leniently
//! - **Cancellable**: every exchange can be cancelled cooperatively, keeping partial text
//! - **Type-Safe**: multi-part content can never be empty, failures are a closed taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_chat_core::{ChatClient, ChatConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> ai_chat_core::Result<()> {
//!     let client = ChatClient::new(ChatConfig::load(None)?)?;
//!     let mut chat = Orchestrator::new(&client);
//!
//!     chat.submit_user_turn("Hello, how are you?", Some("You are concise."))?;
//!     chat.run_until_idle().await;
//!
//!     for message in chat.messages() {
//!         println!("{}: {}", message.role(), message.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Messages, content parts, stream events, error outcomes |
//! | [`protocol`] | Wire shapes of requests, responses and stream chunks |
//! | [`pipeline`] | SSE stream decoding |
//! | [`transport`] | HTTP transport trait and reqwest implementation |
//! | [`client`] | Client, dispatcher and exchange handles |
//! | [`conversation`] | Conversation, orchestrator and persistence |
//! | [`config`] | YAML/env configuration |

pub mod client;
pub mod config;
pub mod conversation;
pub mod pipeline;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use client::{
    CancelHandle, ChatClient, ChatClientBuilder, Completion, Dispatcher, ExchangeHandle,
    ExchangeOptions, ExchangeState, ExchangeUpdate,
};
pub use config::ChatConfig;
pub use conversation::{Conversation, ConversationStore, InMemoryStore, Orchestrator};
pub use types::{
    events::StreamEvent,
    message::{ContentPart, Message, MessageContent, MessageRole},
    outcome::ErrorOutcome,
    tool::ToolCall,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for stream items
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
