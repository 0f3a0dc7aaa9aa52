//! Provider registry — the set of configured adapters, in configuration
//! order.
//!
//! Built once at process start from configuration and environment presence
//! checks. No global singletons: the registry is constructed explicitly and
//! shared via `Arc`.

use std::sync::Arc;
use switchboard_config::AppConfig;
use switchboard_core::provider::{ProviderAdapter, ProviderFamily};
use tracing::info;

use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// The live model list of one provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProviderModels {
    pub provider: String,
    pub models: Vec<String>,
}

/// All configured adapters, preserving configuration order.
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Register an adapter. Later registrations with the same name are
    /// ignored — the first configuration wins.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        if self.get(adapter.name()).is_none() {
            self.adapters.push(adapter);
        }
    }

    /// Get a specific adapter by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// The first configured adapter of the given family, if any.
    pub fn first_of_family(&self, family: ProviderFamily) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.family() == family)
            .cloned()
    }

    /// The first adapter in configuration order.
    pub fn first(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.first().cloned()
    }

    /// Iterate adapters in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.adapters.iter()
    }

    /// Number of configured adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapters are configured.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// All registered adapter names, in configuration order.
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Fetch every provider's live model list.
    ///
    /// Lists are queried fresh, not cached — availability can change between
    /// calls. Providers that fail to respond appear with an empty list.
    pub async fn available_models(&self) -> Vec<ProviderModels> {
        let mut out = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            out.push(ProviderModels {
                provider: adapter.name().to_string(),
                models: adapter.list_models().await,
            });
        }
        out
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    for provider_config in &config.providers {
        let api_key = provider_config.api_key.clone().unwrap_or_default();

        let adapter: Arc<dyn ProviderAdapter> = match provider_config.family {
            ProviderFamily::OpenAi => {
                let base_url = provider_config
                    .api_url
                    .clone()
                    .unwrap_or_else(|| default_base_url(&provider_config.name));
                Arc::new(OpenAiCompatProvider::new(
                    &provider_config.name,
                    &base_url,
                    &api_key,
                ))
            }
            ProviderFamily::Google => {
                let mut p = GoogleProvider::new(&provider_config.name, &api_key);
                if let Some(url) = &provider_config.api_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
        };

        info!(
            provider = %provider_config.name,
            family = %provider_config.family,
            "Provider registered"
        );
        registry.register(adapter);
    }

    registry
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "grok" => "https://api.x.ai/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
