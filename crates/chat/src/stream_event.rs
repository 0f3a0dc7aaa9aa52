//! Typed frames for streamed chat responses.
//!
//! `ChatStreamEvent` wraps provider-level stream chunks into the frames the
//! gateway forwards to clients over SSE:
//! - `metadata` — names the chosen provider/model before any content
//! - `content`  — incremental text and any generated asset URLs
//! - `done`     — the stream completed and the reply was persisted
//! - `error`    — an error occurred

use serde::{Deserialize, Serialize};
use switchboard_core::message::Asset;
use switchboard_core::provider::Usage;

/// Events emitted during one streamed chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// The routing decision, sent before any content.
    Metadata {
        provider: String,
        model: String,
        reasoning: String,
    },

    /// Incremental reply text and any assets completed in this frame.
    Content {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        assets: Vec<Asset>,
    },

    /// The stream completed; the assistant message has been persisted.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },

    /// An error occurred mid-stream.
    Error { message: String },
}

impl ChatStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Metadata { .. } => "metadata",
            Self::Content { .. } => "content",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
