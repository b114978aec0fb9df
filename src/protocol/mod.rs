//! Wire protocol of the OpenAI-compatible `/chat/completions` endpoint.
//!
//! Everything that knows JSON field names lives here; the rest of the crate works
//! with [`crate::types`].

pub mod request;
pub mod response;

pub use request::ChatRequest;
pub use response::{
    error_message_from_body, ApiError, ChatCompletionChunk, ChatCompletionResponse,
};
