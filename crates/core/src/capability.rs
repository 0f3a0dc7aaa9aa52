//! Capability registry — what each known model is good at.
//!
//! Static configuration data loaded once at process start. The only consumer
//! is the master router, which embeds the rendered registry into the
//! orchestrator model's instruction so it can match messages to models.

use serde::{Deserialize, Serialize};

/// A short natural-language description of one model's strengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapability {
    /// The model this entry describes
    pub model_id: String,

    /// What the model is good at, e.g. "long-context analysis and planning"
    pub description: String,
}

/// The set of capability descriptions known to this process.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    entries: Vec<ProviderCapability>,
}

impl CapabilityRegistry {
    /// Build a registry from explicit entries.
    pub fn new(entries: Vec<ProviderCapability>) -> Self {
        Self { entries }
    }

    /// The built-in defaults for well-known models.
    pub fn defaults() -> Self {
        let entry = |model_id: &str, description: &str| ProviderCapability {
            model_id: model_id.into(),
            description: description.into(),
        };

        Self::new(vec![
            entry("gpt-4o", "coding, logic, and structured reasoning"),
            entry("gpt-4o-mini", "cheap and fast for simple exchanges"),
            entry("gemini-1.5-pro", "long-context analysis, planning, and long-form synthesis"),
            entry("gemini-1.5-flash", "fast drafting and lightweight tasks"),
            entry("gemini-2.0-flash-exp", "image generation and multimodal requests"),
            entry("grok-2-1212", "current events and conversational tone"),
        ])
    }

    /// Look up the description for a model, if one is registered.
    pub fn describe(&self, model_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.model_id == model_id)
            .map(|e| e.description.as_str())
    }

    /// Render the registry as a bullet list for the routing instruction.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("- {}: {}", e.model_id, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::defaults()
    }
}
