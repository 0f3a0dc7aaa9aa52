//! # Switchboard Core
//!
//! Domain types, traits, and error definitions for the Switchboard chat
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod error;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use capability::{CapabilityRegistry, ProviderCapability};
pub use error::{Error, ProviderError, Result, StoreError};
pub use message::{Actor, Asset, AssetKind, ChatId, ChatState, Message, Role};
pub use provider::{
    GenerateRequest, GenerateResponse, ProviderAdapter, ProviderFamily, StreamChunk, Usage,
};
pub use store::ConversationStore;
