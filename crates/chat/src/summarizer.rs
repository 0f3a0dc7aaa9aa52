//! Background compaction of raw history into the rolling summary.
//!
//! `maybe_compact` is a no-op unless the stored history has reached the
//! trigger, so it can be invoked after every turn and fires only
//! periodically. When it fires, the oldest `batch_size` messages are folded
//! into the summary by a summarization model and dropped from raw history —
//! destructive compaction, the folded copies are not retained elsewhere.
//!
//! Failure semantics: state is written only after a successful model
//! response, via a version-checked put. A lost write race aborts without
//! retry; the next eligible turn re-checks the trigger against the
//! then-current history.

use std::sync::Arc;
use switchboard_config::SummarizerConfig;
use switchboard_core::error::{Error, Result};
use switchboard_core::message::{ChatId, Message, Role};
use switchboard_core::provider::{GenerateRequest, ProviderAdapter};
use switchboard_core::store::ConversationStore;
use switchboard_providers::ProviderRegistry;
use tracing::{debug, info, warn};

/// What one `maybe_compact` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// History below the trigger; nothing read or written.
    NotTriggered,
    /// Folded `folded` messages into the summary, leaving `remaining`.
    Compacted { folded: usize, remaining: usize },
    /// Lost the write race to a concurrent turn; not retried.
    Conflicted,
}

/// Compacts the oldest raw history into the rolling summary.
pub struct Summarizer {
    store: Arc<dyn ConversationStore>,
    adapter: Arc<dyn ProviderAdapter>,
    config: SummarizerConfig,
}

impl Summarizer {
    /// Create a summarizer over an explicit adapter.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        adapter: Arc<dyn ProviderAdapter>,
        config: SummarizerConfig,
    ) -> Self {
        Self {
            store,
            adapter,
            config,
        }
    }

    /// Resolve the configured summarization provider from the registry.
    /// Returns `None` (compaction disabled) when it isn't configured.
    pub fn from_config(
        config: &SummarizerConfig,
        registry: &ProviderRegistry,
        store: Arc<dyn ConversationStore>,
    ) -> Option<Self> {
        match registry.get(&config.provider) {
            Some(adapter) => Some(Self::new(store, adapter, config.clone())),
            None => {
                warn!(
                    provider = %config.provider,
                    "Summarizer provider not configured; compaction disabled"
                );
                None
            }
        }
    }

    /// Whether a history of this length triggers compaction.
    fn triggered(&self, history_len: usize) -> bool {
        history_len >= self.config.min_messages && history_len % self.config.cadence == 0
    }

    /// Compact the chat's oldest messages into its summary, if the trigger
    /// condition holds. Safe to call repeatedly; below the trigger it reads
    /// one record and writes nothing.
    pub async fn maybe_compact(&self, chat_id: &ChatId) -> Result<CompactionOutcome> {
        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat '{chat_id}'")))?;

        if !self.triggered(chat.history.len()) {
            return Ok(CompactionOutcome::NotTriggered);
        }

        let batch = &chat.history[..self.config.batch_size];
        debug!(
            chat_id = %chat_id,
            folding = batch.len(),
            total = chat.history.len(),
            "Compaction triggered"
        );

        let request = GenerateRequest {
            model: self.config.model.clone(),
            persona: Self::instruction(&chat.summary),
            summary: "(not applicable)".into(),
            history: Vec::new(),
            user_message: format!(
                "New messages to incorporate:\n{}",
                Self::transcript(batch)
            ),
            temperature: 0.3,
            max_tokens: Some(1024),
        };

        // State is only touched after this call succeeds.
        let response = self.adapter.generate(request).await?;
        let new_summary = response.text.trim().to_string();
        if new_summary.is_empty() {
            return Err(Error::Internal(
                "summarization model returned an empty summary".into(),
            ));
        }

        let folded = self.config.batch_size;
        let mut updated = chat;
        updated.summary = new_summary;
        updated.history.drain(..folded);
        updated.updated_at = chrono::Utc::now();
        let remaining = updated.history.len();

        match self.store.put_chat(updated).await {
            Ok(_) => {
                info!(chat_id = %chat_id, folded, remaining, "Compaction complete");
                Ok(CompactionOutcome::Compacted { folded, remaining })
            }
            Err(switchboard_core::error::StoreError::WriteConflict { .. }) => {
                // A concurrent turn appended while we were summarizing.
                // Abort rather than retry: the folded prefix must never be
                // consumed twice, and the next eligible turn re-checks.
                warn!(chat_id = %chat_id, "Compaction lost a write race, aborting");
                Ok(CompactionOutcome::Conflicted)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The summarization instruction. The output may later be shown to the
    /// user, so backend brand names are explicitly forbidden.
    fn instruction(current_summary: &str) -> String {
        format!(
            "Update the rolling conversation summary by folding in the new messages. \
             Summarize as themes, decisions made, open questions, and current blockers. \
             Retain key facts, decisions, and technical details. Keep it concise and factual. \
             Refer to the assistant only as 'the assistant'. \
             Never mention model or backend brand names.\n\n\
             Current summary:\n{}",
            if current_summary.trim().is_empty() {
                "(empty)"
            } else {
                current_summary
            }
        )
    }

    fn transcript(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
