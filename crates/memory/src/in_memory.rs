//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use switchboard_core::error::StoreError;
use switchboard_core::message::{Actor, ChatId, ChatState};
use switchboard_core::store::ConversationStore;
use tokio::sync::RwLock;

/// An in-memory store holding actors and chats in maps.
///
/// Implements the same version CAS as the SQLite backend so concurrency
/// tests exercise the real contract.
pub struct InMemoryStore {
    actors: RwLock<HashMap<String, Actor>>,
    chats: RwLock<HashMap<String, ChatState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            actors: RwLock::new(HashMap::new()),
            chats: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_actor(&self, actor_id: &str) -> Result<Option<Actor>, StoreError> {
        Ok(self.actors.read().await.get(actor_id).cloned())
    }

    async fn put_actor(&self, actor: Actor) -> Result<(), StoreError> {
        self.actors.write().await.insert(actor.id.clone(), actor);
        Ok(())
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Option<ChatState>, StoreError> {
        Ok(self.chats.read().await.get(&chat_id.0).cloned())
    }

    async fn put_chat(&self, mut chat: ChatState) -> Result<u64, StoreError> {
        let mut chats = self.chats.write().await;

        let found = chats.get(&chat.id.0).map(|c| c.version).unwrap_or(0);
        if found != chat.version {
            return Err(StoreError::WriteConflict {
                key: format!("chats/{}", chat.id),
                expected: chat.version,
                found,
            });
        }

        chat.version += 1;
        let version = chat.version;
        chats.insert(chat.id.0.clone(), chat);
        Ok(version)
    }

    async fn list_chats(&self, actor_id: &str) -> Result<Vec<ChatState>, StoreError> {
        let chats = self.chats.read().await;
        let mut out: Vec<ChatState> = chats
            .values()
            .filter(|c| c.actor_id == actor_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }
}
