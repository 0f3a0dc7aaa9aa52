//! ProviderAdapter trait — the abstraction over LLM backends.
//!
//! An adapter knows how to list its backend's available models and to send
//! one assembled chat turn to an LLM, either as a complete response or as a
//! stream of chunks.
//!
//! Adapters are stateless with respect to conversation — all context is
//! passed in per call. Implementations: OpenAI-compatible, Google.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{Asset, Message};

/// Which vendor family an adapter belongs to.
///
/// The router uses this for its long-message heuristic and for the rule that
/// image-generation requests may only go to the Google family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    /// OpenAI and OpenAI-compatible endpoints (OpenAI, Grok, ...)
    OpenAi,
    /// Google Gemini endpoints
    Google,
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// One assembled chat turn, ready for a backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The model to use (e.g. "gpt-4o", "gemini-1.5-pro")
    pub model: String,

    /// Layer 1: the actor's system prompt, verbatim
    pub persona: String,

    /// Layer 2: the rolling summary (placeholder text when empty)
    pub summary: String,

    /// Layer 3: the bounded window of recent raw messages, oldest first
    pub history: Vec<Message>,

    /// The current user message
    pub user_message: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl GenerateRequest {
    /// Swap the model ID, keeping all context intact. Used by the
    /// model-fallback chain.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The combined system instruction sent to backends: the persona
    /// (layer 1) followed by the rolling summary (layer 2).
    pub fn system_instruction(&self) -> String {
        format!(
            "{}\n\nCONVERSATION SUMMARY:\n{}",
            self.persona, self.summary
        )
    }
}

/// A complete (non-streaming) response from a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The generated text
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Which adapter produced this response
    pub provider: String,

    /// Generated assets (images etc.), in generation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial text delta
    #[serde(default)]
    pub text: Option<String>,

    /// Assets completed in this chunk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core ProviderAdapter trait.
///
/// Every LLM backend implements this trait. The router and orchestrator call
/// `list_models()` and `generate()` without knowing which backend is being
/// used — pure polymorphism, no type tags.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// A short name identifying this adapter (e.g. "openai", "google", "grok").
    fn name(&self) -> &str;

    /// Which vendor family this adapter belongs to.
    fn family(&self) -> ProviderFamily;

    /// List the model IDs currently available on this backend.
    ///
    /// Fails soft: transport errors yield an empty list rather than
    /// propagating, so routing can still proceed with other providers.
    async fn list_models(&self) -> Vec<String>;

    /// Send one assembled turn and get a complete response.
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError>;

    /// Send one assembled turn and get a stream of response chunks.
    ///
    /// Default implementation calls `generate()` and wraps the result as a
    /// single chunk.
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.generate(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                text: Some(response.text),
                assets: response.assets,
                done: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}
