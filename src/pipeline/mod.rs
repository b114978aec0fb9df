//! 流水线处理模块：把流式响应的文本行解码为统一事件。
//!
//! # Stream Decoding Pipeline
//!
//! Turns the line sequence of a streamed completion into [`StreamEvent`]s.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Raw Bytes → Lines → SseDecoder → event_map → StreamEvent
//!     │          │         │            │
//!   HTTP     transport   `data:`      Role, Content,
//!            framing     + [DONE]     ToolCall, Error
//! ```
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | SSE line decoder, lenient on malformed chunks |
//! | [`event_map`] | Parsed chunk to event mapping |
//!
//! [`StreamEvent`]: crate::types::StreamEvent

pub mod decode;
pub mod event_map;


pub use decode::{SseDecoder, DATA_PREFIX, DONE_SIGNAL};
