//! Actor, chat, and message domain types.
//!
//! These are the core value objects that flow through the entire system:
//! a user sends a message as an Actor → the router picks a backend →
//! the provider generates a reply → the orchestrator persists both turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat (one conversation with one actor).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persona definition that chats are conducted "as".
///
/// The `persona` field is the free-text system prompt — layer 1 of the
/// tri-layer memory. Immutable after creation except by explicit edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Unique actor ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Free-text system prompt defining behavior and purpose
    pub persona: String,

    /// When this actor was created
    pub created_at: DateTime<Utc>,
}

impl Actor {
    /// Create a new actor with a generated ID.
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            persona: persona.into(),
            created_at: Utc::now(),
        }
    }
}

/// The role of a message sender in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// A generated artifact attached to an assistant message (e.g. an image URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset kind
    #[serde(rename = "type")]
    pub kind: AssetKind,

    /// Where the asset lives (remote URL or data URL)
    pub url: String,
}

/// The kind of a generated asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    /// Anything we don't recognize — preserved for forward compatibility.
    #[serde(other)]
    Unknown,
}

/// A single message in a chat.
///
/// Immutable once created: never edited, only appended — or dropped from
/// the raw history after being folded into the rolling summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// The chat this message belongs to
    pub chat_id: ChatId,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Which model produced this message (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Generated assets attached to this message, in generation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id,
            role: Role::User,
            content: content.into(),
            model: None,
            assets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a new assistant message, recording which model produced it.
    pub fn assistant(
        chat_id: ChatId,
        content: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id,
            role: Role::Assistant,
            content: content.into(),
            model: Some(model.into()),
            assets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach generated assets.
    pub fn with_assets(mut self, assets: Vec<Asset>) -> Self {
        self.assets = assets;
        self
    }
}

/// One conversation with one actor, carrying layers 2 and 3 of the
/// tri-layer memory.
///
/// `history` grows by append and is the canonical conversation order; it is
/// never reordered. `summary` is overwritten wholesale by the summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatState {
    /// Unique chat ID
    pub id: ChatId,

    /// The actor this chat belongs to
    pub actor_id: String,

    /// Human-readable title
    pub title: String,

    /// Rolling summary of compacted older turns (layer 2); empty until the
    /// first compaction
    #[serde(default)]
    pub summary: String,

    /// Raw message history (layer 3), oldest first
    #[serde(default)]
    pub history: Vec<Message>,

    /// Store revision, used for compare-and-swap writes
    #[serde(default)]
    pub version: u64,

    /// When this chat was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added or the summary was rewritten
    pub updated_at: DateTime<Utc>,
}

impl ChatState {
    /// Create a new empty chat for an actor.
    pub fn new(actor_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ChatId::new(),
            actor_id: actor_id.into(),
            title: title.into(),
            summary: String::new(),
            history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message to the history.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.history.push(message);
    }

    /// The most recent `n` messages, in original order.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}
