//! Client runtime for OpenAI-compatible chat completion endpoints.
//!
//! Keep the public surface small: build a [`ChatClient`], take a [`Dispatcher`] from
//! it, start exchanges and consume their [`ExchangeHandle`]s.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod chat;
pub mod core;
pub mod dispatcher;
pub mod error_classification;
mod execution;
pub mod types;

pub use builder::ChatClientBuilder;
pub use chat::ExchangeOptions;
pub use core::ChatClient;
pub use dispatcher::Dispatcher;
pub use error_classification::classify;
pub use types::{
    CancelHandle, Completion, ExchangeHandle, ExchangeResult, ExchangeState, ExchangeUpdate,
};
