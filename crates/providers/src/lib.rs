//! LLM provider adapters for Switchboard.
//!
//! All adapters implement the `switchboard_core::ProviderAdapter` trait.
//! The registry is built from configuration at process start; the master
//! router picks among registered adapters per message.

pub mod fallback;
pub mod google;
pub mod openai_compat;
pub mod registry;

pub use fallback::{generate_with_fallbacks, stream_with_fallbacks};
pub use google::GoogleProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{ProviderModels, ProviderRegistry, build_from_config};
