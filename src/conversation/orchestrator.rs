//! Conversation orchestration: one pending exchange, folded into the message list.
//!
//! ```text
//! submit_user_turn ──> [.., User, Assistant("thinking…")]
//!        │
//!   Delta(accumulated) ──> placeholder := Assistant(accumulated)
//!   Finished(Ok)       ──> placeholder := Assistant(content, tool_calls, citations)
//!   Finished(Err)      ──> placeholder := partial + marker
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::client::chat::ExchangeOptions;
use crate::client::core::ChatClient;
use crate::client::dispatcher::Dispatcher;
use crate::client::types::{
    CancelHandle, ExchangeHandle, ExchangeResult, ExchangeState, ExchangeUpdate,
};
use crate::conversation::store::{noop_store, ConversationStore};
use crate::conversation::Conversation;
use crate::types::message::{Message, MessageContent, MessageRole};
use crate::types::outcome::ErrorOutcome;
use crate::{Error, ErrorContext, Result};

/// Content of the assistant turn while a request is pending.
pub const PLACEHOLDER_TEXT: &str = "thinking…";

/// Shown when an exchange was cancelled.
pub const CANCELLED_MARKER: &str = "[Request cancelled]";

/// Prefix of a rendered failure.
pub const ERROR_MARKER: &str = "[Error]";

struct PendingExchange {
    handle: ExchangeHandle,
    /// Index of the placeholder turn.
    placeholder: usize,
    accumulated: String,
}

/// Owns a [`Conversation`] and drives at most one exchange for it.
pub struct Orchestrator {
    conversation: Conversation,
    dispatcher: Dispatcher,
    options: ExchangeOptions,
    store: Arc<dyn ConversationStore>,
    pending: Option<PendingExchange>,
    messages_tx: watch::Sender<Vec<Message>>,
    busy_tx: watch::Sender<bool>,
    /// Feeds the single save task; started on first use.
    saves: Option<mpsc::UnboundedSender<Conversation>>,
}

impl Orchestrator {
    /// New empty conversation that is not persisted.
    pub fn new(client: &ChatClient) -> Self {
        Self::with_store(client, noop_store())
    }

    pub fn with_store(client: &ChatClient, store: Arc<dyn ConversationStore>) -> Self {
        Self::from_conversation(client, store, Conversation::new())
    }

    pub fn from_conversation(
        client: &ChatClient,
        store: Arc<dyn ConversationStore>,
        conversation: Conversation,
    ) -> Self {
        let (messages_tx, _) = watch::channel(conversation.messages().to_vec());
        let (busy_tx, _) = watch::channel(false);
        Self {
            dispatcher: client.dispatcher(),
            options: client.default_options(),
            conversation,
            store,
            pending: None,
            messages_tx,
            busy_tx,
            saves: None,
        }
    }

    /// Restore a saved conversation.
    pub async fn resume(
        client: &ChatClient,
        store: Arc<dyn ConversationStore>,
        id: &str,
    ) -> Result<Self> {
        let conversation = store.load(id).await?.ok_or_else(|| {
            Error::runtime_with_context(
                "conversation not found",
                ErrorContext::new()
                    .with_field_path("id")
                    .with_details(id.to_string())
                    .with_source("conversation_store"),
            )
        })?;
        debug!(
            conversation_id = id,
            messages = conversation.len(),
            "conversation resumed"
        );
        Ok(Self::from_conversation(client, store, conversation))
    }

    /// Replace the options used for subsequent exchanges.
    pub fn with_options(mut self, options: ExchangeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_options(&mut self, options: ExchangeOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &ExchangeOptions {
        &self.options
    }

    pub fn id(&self) -> &str {
        self.conversation.id()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// State of the pending exchange, if any.
    pub fn exchange_state(&self) -> Option<ExchangeState> {
        self.pending.as_ref().map(|p| p.handle.state())
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages_tx.subscribe()
    }

    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    /// Append a user turn and start answering it.
    ///
    /// The request carries the optional system prompt, the existing turns and the
    /// new one. Rejected with [`Error::Busy`] while an exchange is pending; the
    /// conversation is left untouched on any error.
    pub fn submit_user_turn(
        &mut self,
        content: impl Into<MessageContent>,
        system_prompt: Option<&str>,
    ) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::Busy);
        }

        let user = Message::new(MessageRole::User, content);
        let mut snapshot = Vec::with_capacity(self.conversation.len() + 2);
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            snapshot.push(Message::system(prompt));
        }
        snapshot.extend(self.conversation.messages().iter().cloned());
        snapshot.push(user.clone());

        let handle = self.dispatcher.start(snapshot, &self.options)?;

        self.conversation.append(user);
        self.conversation.append(Message::assistant(PLACEHOLDER_TEXT));
        self.pending = Some(PendingExchange {
            handle,
            placeholder: self.conversation.len() - 1,
            accumulated: String::new(),
        });
        self.busy_tx.send_replace(true);
        self.publish();
        Ok(())
    }

    /// Wait for the next update of the pending exchange and fold it in.
    ///
    /// Returns `false` when there is nothing pending.
    pub async fn process_next_update(&mut self) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };

        let update = pending.handle.next_update().await.unwrap_or_else(|| {
            ExchangeUpdate::Finished(Err(ErrorOutcome::Unexpected {
                message: "exchange ended without a result".to_string(),
            }))
        });

        match update {
            ExchangeUpdate::Delta { accumulated, .. } => {
                pending.accumulated.clone_from(&accumulated);
                let index = pending.placeholder;
                self.replace_turn(index, Message::assistant(accumulated));
                self.publish();
            }
            ExchangeUpdate::Finished(result) => self.finish(result),
        }
        true
    }

    /// Drive the pending exchange to its terminal state.
    pub async fn run_until_idle(&mut self) {
        while self.process_next_update().await {}
    }

    /// Cancel the pending exchange. No-op when idle.
    pub fn cancel_current_request(&self) {
        if let Some(pending) = &self.pending {
            self.dispatcher.cancel(&pending.handle);
        }
    }

    /// Cancellation handle of the pending exchange, usable from another task.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.pending.as_ref().map(|p| p.handle.cancel_handle())
    }

    /// Remove a turn. Rejected with [`Error::Busy`] while an exchange is pending.
    pub fn remove_message(&mut self, index: usize) -> Result<Message> {
        if self.pending.is_some() {
            return Err(Error::Busy);
        }
        let removed = self.conversation.remove(index)?;
        self.publish();
        self.persist();
        Ok(removed)
    }

    fn finish(&mut self, result: ExchangeResult) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let message = match result {
            Ok(completion) => Message::new(MessageRole::Assistant, completion.content)
                .with_tool_calls(completion.tool_calls)
                .with_citations(completion.citations),
            Err(outcome) => Message::assistant(render_failure(&pending.accumulated, &outcome)),
        };
        self.replace_turn(pending.placeholder, message);

        self.busy_tx.send_replace(false);
        self.publish();
        self.persist();
    }

    fn replace_turn(&mut self, index: usize, message: Message) {
        if let Err(e) = self.conversation.replace(index, message) {
            warn!(error = %e, "placeholder turn vanished");
        }
    }

    fn publish(&self) {
        self.messages_tx
            .send_replace(self.conversation.messages().to_vec());
    }

    /// Queue a snapshot for saving. Snapshots are saved one at a time in queue order.
    fn persist(&mut self) {
        let snapshot = self.conversation.clone();
        let saves = self.saves.get_or_insert_with(|| spawn_writer(self.store.clone()));
        if let Err(mpsc::error::SendError(snapshot)) = saves.send(snapshot) {
            warn!(conversation_id = snapshot.id(), "save task is gone");
        }
    }
}

/// Saves queued snapshots in order until the orchestrator is dropped.
fn spawn_writer(store: Arc<dyn ConversationStore>) -> mpsc::UnboundedSender<Conversation> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Conversation>();
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            if let Err(e) = store.save(&snapshot).await {
                warn!(
                    conversation_id = snapshot.id(),
                    error = %e,
                    "failed to persist conversation"
                );
            }
        }
    });
    tx
}

/// Text of the assistant turn after a failed or cancelled exchange.
fn render_failure(partial: &str, outcome: &ErrorOutcome) -> String {
    let marker = if outcome.is_cancelled() {
        CANCELLED_MARKER.to_string()
    } else {
        format!("{} {}", ERROR_MARKER, outcome.message())
    };
    if partial.is_empty() {
        marker
    } else {
        format!("{}\n\n{}", partial, marker)
    }
}
