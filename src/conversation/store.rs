//! Conversation persistence.
//!
//! The orchestrator saves a snapshot after every finished exchange. Stores are free
//! to be slow; saving never blocks the conversation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::conversation::Conversation;
use crate::Result;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    async fn load(&self, id: &str) -> Result<Option<Conversation>>;
}

/// Discards everything (default store).
pub struct NoopStore;

#[async_trait]
impl ConversationStore for NoopStore {
    async fn save(&self, _conversation: &Conversation) -> Result<()> {
        Ok(())
    }

    async fn load(&self, _id: &str) -> Result<Option<Conversation>> {
        Ok(None)
    }
}

pub fn noop_store() -> Arc<dyn ConversationStore> {
    Arc::new(NoopStore)
}

/// Keeps the latest snapshot per conversation id, for tests and short-lived sessions.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, id: &str) -> Option<Conversation> {
        self.conversations.read().await.get(id).cloned()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn save(&self, conversation: &Conversation) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(conversation.id().to_string(), conversation.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.get(id).await)
    }
}
