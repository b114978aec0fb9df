use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::types::message::{Citation, MessageContent};
use crate::types::outcome::ErrorOutcome;
use crate::types::tool::ToolCall;

/// Success value of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::text(text),
            tool_calls: Vec::new(),
            citations: Vec::new(),
            finish_reason: None,
            usage: None,
        }
    }
}

pub type ExchangeResult = std::result::Result<Completion, ErrorOutcome>;

/// What an exchange reports back, in order. `Finished` is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeUpdate {
    /// A streamed text fragment plus everything received so far.
    Delta { fragment: String, accumulated: String },
    Finished(ExchangeResult),
}

/// Lifecycle of one exchange.
///
/// ```text
/// Idle -> Sent -> Streaming            -> Succeeded | Failed | Cancelled
///              -> AwaitingFullResponse -> Succeeded | Failed | Cancelled
/// Idle | Sent -> Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    Idle,
    Sent,
    Streaming,
    AwaitingFullResponse,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangeState::Succeeded | ExchangeState::Failed | ExchangeState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        match (self, next) {
            (Idle, Sent) => true,
            (Sent, Streaming | AwaitingFullResponse) => true,
            (Streaming | AwaitingFullResponse, Succeeded) => true,
            (Idle | Sent | Streaming | AwaitingFullResponse, Failed | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeState::Idle => "idle",
            ExchangeState::Sent => "sent",
            ExchangeState::Streaming => "streaming",
            ExchangeState::AwaitingFullResponse => "awaiting_full_response",
            ExchangeState::Succeeded => "succeeded",
            ExchangeState::Failed => "failed",
            ExchangeState::Cancelled => "cancelled",
        }
    }
}

/// Writer side of the exchange state, owned by the exchange task.
pub(crate) struct StateCell {
    tx: watch::Sender<ExchangeState>,
}

impl StateCell {
    pub(crate) fn new() -> (Self, watch::Receiver<ExchangeState>) {
        let (tx, rx) = watch::channel(ExchangeState::Idle);
        (Self { tx }, rx)
    }

    pub(crate) fn current(&self) -> ExchangeState {
        *self.tx.borrow()
    }

    /// Apply a transition. Illegal transitions are logged and ignored.
    pub(crate) fn advance(&self, next: ExchangeState) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!(
                from = current.as_str(),
                to = next.as_str(),
                "ignoring illegal exchange state transition"
            );
            return false;
        }
        self.tx.send_replace(next);
        true
    }
}

/// Cancellation handle for in-flight exchanges.
///
/// Clones share one token. Cancelling is idempotent.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Caller side of a running exchange.
#[derive(Debug)]
pub struct ExchangeHandle {
    id: String,
    cancel: CancelHandle,
    state: watch::Receiver<ExchangeState>,
    updates: mpsc::UnboundedReceiver<ExchangeUpdate>,
    finished: bool,
}

impl ExchangeHandle {
    pub(crate) fn new(
        id: String,
        cancel: CancelHandle,
        state: watch::Receiver<ExchangeState>,
        updates: mpsc::UnboundedReceiver<ExchangeUpdate>,
    ) -> Self {
        Self {
            id,
            cancel,
            state,
            updates,
            finished: false,
        }
    }

    /// Client request id, also sent as `x-request-id`.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> ExchangeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ExchangeState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next update, or `None` after `Finished` has been returned.
    ///
    /// Once cancellation has been requested, queued deltas are dropped and a
    /// success that raced with the cancel is reported as `Cancelled`.
    pub async fn next_update(&mut self) -> Option<ExchangeUpdate> {
        if self.finished {
            return None;
        }
        loop {
            let update = match self.updates.recv().await {
                Some(update) => update,
                None => {
                    // The task went away without reporting, e.g. it panicked.
                    self.finished = true;
                    let outcome = if self.cancel.is_cancelled() {
                        ErrorOutcome::Cancelled
                    } else {
                        ErrorOutcome::Unexpected {
                            message: "exchange ended without a result".to_string(),
                        }
                    };
                    return Some(ExchangeUpdate::Finished(Err(outcome)));
                }
            };

            match update {
                ExchangeUpdate::Delta { .. } if self.cancel.is_cancelled() => continue,
                ExchangeUpdate::Delta { .. } => return Some(update),
                ExchangeUpdate::Finished(result) => {
                    self.finished = true;
                    let result = match result {
                        Ok(_) if self.cancel.is_cancelled() => Err(ErrorOutcome::Cancelled),
                        other => other,
                    };
                    return Some(ExchangeUpdate::Finished(result));
                }
            }
        }
    }

    /// Drain the exchange and return its result.
    pub async fn wait(mut self) -> ExchangeResult {
        while let Some(update) = self.next_update().await {
            if let ExchangeUpdate::Finished(result) = update {
                return result;
            }
        }
        Err(ErrorOutcome::Unexpected {
            message: "exchange result already consumed".to_string(),
        })
    }
}
