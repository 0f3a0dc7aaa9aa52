//! Tri-layer memory assembler.
//!
//! Produces the context for one turn from three layers:
//!
//! 1. **Persona** — the actor's system prompt, loaded verbatim, never trimmed
//! 2. **Summary** — the compacted rolling summary of older turns
//! 3. **Recent history** — a bounded window of recent raw messages
//!
//! The assembler is read-only: the window is a truncation of the returned
//! value, not of stored history.
//!
//! The three layers come from two point reads (actor, chat). The store
//! contract offers no cross-key snapshot, so a concurrent compaction can be
//! observed between them; callers get a consistent-per-record, best-effort
//! view.

use std::sync::Arc;
use switchboard_core::error::{Error, Result};
use switchboard_core::message::{ChatId, Message};
use switchboard_core::store::ConversationStore;
use tracing::debug;

/// What callers see in place of a summary before the first compaction.
/// Never an empty string, to avoid prompt ambiguity.
pub const NO_SUMMARY_PLACEHOLDER: &str = "No summary available yet.";

/// The assembled tri-layer context for one turn. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Layer 1: the actor's persona, verbatim
    pub persona: String,

    /// Layer 2: the rolling summary, or the explicit placeholder
    pub summary: String,

    /// Layer 3: the most recent raw messages, in original order
    pub recent_history: Vec<Message>,
}

/// Reads Actor + ChatState and produces an [`AssembledContext`].
pub struct MemoryAssembler {
    store: Arc<dyn ConversationStore>,
    recent_window: usize,
}

impl MemoryAssembler {
    /// Create an assembler with the given recent-history window.
    pub fn new(store: Arc<dyn ConversationStore>, recent_window: usize) -> Self {
        Self {
            store,
            recent_window,
        }
    }

    /// Assemble the three layers for one turn.
    ///
    /// Fails with `NotFound` when the actor or chat doesn't exist, or when
    /// the chat belongs to a different actor.
    pub async fn assemble(&self, actor_id: &str, chat_id: &ChatId) -> Result<AssembledContext> {
        let actor = self
            .store
            .get_actor(actor_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("actor '{actor_id}'")))?;

        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat '{chat_id}'")))?;

        if chat.actor_id != actor_id {
            return Err(Error::NotFound(format!(
                "chat '{chat_id}' for actor '{actor_id}'"
            )));
        }

        let summary = if chat.summary.trim().is_empty() {
            NO_SUMMARY_PLACEHOLDER.to_string()
        } else {
            chat.summary.clone()
        };

        let recent_history = chat.recent(self.recent_window).to_vec();

        debug!(
            actor_id,
            chat_id = %chat_id,
            window = recent_history.len(),
            total = chat.history.len(),
            "Context assembled"
        );

        Ok(AssembledContext {
            persona: actor.persona,
            summary,
            recent_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::message::{Actor, ChatState};
    use switchboard_memory::InMemoryStore;

    async fn seed(store: &InMemoryStore) -> (String, ChatId) {
        let actor = Actor::new("Katie", "You are concise.");
        let actor_id = actor.id.clone();
        store.put_actor(actor).await.unwrap();

        let chat = ChatState::new(&actor_id, "First chat");
        let chat_id = chat.id.clone();
        store.put_chat(chat).await.unwrap();

        (actor_id, chat_id)
    }

    #[tokio::test]
    async fn empty_chat_yields_placeholder_summary_and_no_history() {
        let store = Arc::new(InMemoryStore::new());
        let (actor_id, chat_id) = seed(&store).await;

        let assembler = MemoryAssembler::new(store, 15);
        let ctx = assembler.assemble(&actor_id, &chat_id).await.unwrap();

        assert_eq!(ctx.persona, "You are concise.");
        assert_eq!(ctx.summary, "No summary available yet.");
        assert!(ctx.recent_history.is_empty());
    }

    #[tokio::test]
    async fn existing_summary_passes_through() {
        let store = Arc::new(InMemoryStore::new());
        let (actor_id, chat_id) = seed(&store).await;

        let mut chat = store.get_chat(&chat_id).await.unwrap().unwrap();
        chat.summary = "The user is planning a shed.".into();
        store.put_chat(chat).await.unwrap();

        let assembler = MemoryAssembler::new(store, 15);
        let ctx = assembler.assemble(&actor_id, &chat_id).await.unwrap();
        assert_eq!(ctx.summary, "The user is planning a shed.");
    }

    #[tokio::test]
    async fn window_truncates_without_mutating_stored_history() {
        let store = Arc::new(InMemoryStore::new());
        let (actor_id, chat_id) = seed(&store).await;

        let mut chat = store.get_chat(&chat_id).await.unwrap().unwrap();
        for i in 0..20 {
            chat.push(Message::user(chat_id.clone(), format!("msg {i}")));
        }
        store.put_chat(chat).await.unwrap();

        let assembler = MemoryAssembler::new(store.clone(), 5);
        let ctx = assembler.assemble(&actor_id, &chat_id).await.unwrap();

        assert_eq!(ctx.recent_history.len(), 5);
        assert_eq!(ctx.recent_history[0].content, "msg 15");
        assert_eq!(ctx.recent_history[4].content, "msg 19");

        // Read-only: the store still holds all 20 messages
        let stored = store.get_chat(&chat_id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 20);
    }

    #[tokio::test]
    async fn unknown_actor_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let (_, chat_id) = seed(&store).await;

        let assembler = MemoryAssembler::new(store, 15);
        let err = assembler.assemble("missing", &chat_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let (actor_id, _) = seed(&store).await;

        let assembler = MemoryAssembler::new(store, 15);
        let err = assembler
            .assemble(&actor_id, &ChatId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn chat_of_another_actor_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let (_, chat_id) = seed(&store).await;

        let other = Actor::new("Other", "Another persona.");
        let other_id = other.id.clone();
        store.put_actor(other).await.unwrap();

        let assembler = MemoryAssembler::new(store, 15);
        let err = assembler.assemble(&other_id, &chat_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
