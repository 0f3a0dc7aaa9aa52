//! ConversationStore trait — keyed persistence for actors and chats.
//!
//! The store contract is deliberately minimal: point reads and writes of
//! JSON-shaped records. The only guarantee beyond single-key read/write is
//! the version check on `put_chat`, which turns the lost-update race between
//! concurrent turns on the same chat into a detectable conflict.
//!
//! Implementations: SQLite (production), in-memory (tests, ephemeral runs).

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::{Actor, ChatId, ChatState};

/// Keyed read/write persistence for Actor and ChatState records.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g. "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Fetch an actor by ID.
    async fn get_actor(&self, actor_id: &str)
        -> std::result::Result<Option<Actor>, StoreError>;

    /// Store an actor (insert or overwrite).
    async fn put_actor(&self, actor: Actor) -> std::result::Result<(), StoreError>;

    /// Fetch a chat by ID, including its full history.
    async fn get_chat(
        &self,
        chat_id: &ChatId,
    ) -> std::result::Result<Option<ChatState>, StoreError>;

    /// Compare-and-swap write of a chat record.
    ///
    /// Succeeds only when the stored version equals `chat.version` (a record
    /// not yet stored counts as version 0). On success the record is written
    /// with the version incremented, and the new version is returned. A
    /// mismatch fails with [`StoreError::WriteConflict`] and leaves the
    /// stored record untouched.
    async fn put_chat(&self, chat: ChatState) -> std::result::Result<u64, StoreError>;

    /// List all chats belonging to an actor, most recently updated first.
    async fn list_chats(
        &self,
        actor_id: &str,
    ) -> std::result::Result<Vec<ChatState>, StoreError>;
}
