//! Configuration loading, validation, and management for Switchboard.
//!
//! Loads configuration from a TOML file with environment variable overrides:
//! providers present in the environment (`OPENAI_API_KEY`, `GEMINI_API_KEY`,
//! `XAI_API_KEY`) are added to the registry at startup if the file doesn't
//! already configure them. Validates all settings before the process starts
//! serving.

use serde::{Deserialize, Serialize};
use std::path::Path;
use switchboard_core::capability::ProviderCapability;
use switchboard_core::provider::ProviderFamily;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configured providers. Order matters: the router's heuristic falls
    /// back to the first configured provider when no family preference
    /// applies.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Master router configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Memory assembler configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Summarizer (compaction) configuration
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Conversation store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Capability registry overrides; empty means "use built-in defaults"
    #[serde(default)]
    pub capabilities: Vec<ProviderCapability>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("providers", &self.providers)
            .field("router", &self.router)
            .field("memory", &self.memory)
            .field("summarizer", &self.summarizer)
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}

/// One LLM backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry name (e.g. "openai", "google", "grok")
    pub name: String,

    /// Which adapter family to build for this provider
    pub family: ProviderFamily,

    /// API key; falls back to the environment at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (e.g. "https://api.x.ai/v1" for Grok)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// The statically configured default model for this provider
    pub flagship_model: String,

    /// Alternate model IDs to try, in order, when generation with the
    /// requested model fails
    #[serde(default)]
    pub fallback_models: Vec<String>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("flagship_model", &self.flagship_model)
            .field("fallback_models", &self.fallback_models)
            .finish()
    }
}

/// Master router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Which configured provider hosts the orchestrator model. `None`
    /// disables the orchestrator query entirely (heuristic-only routing).
    #[serde(default = "default_router_provider")]
    pub provider: Option<String>,

    /// The orchestrator model itself — a cheap, fast decision model
    #[serde(default = "default_router_model")]
    pub model: String,

    /// Messages longer than this many characters prefer the long-context
    /// family in the heuristic fallback
    #[serde(default = "default_long_message_threshold")]
    pub long_message_threshold: usize,

    /// How many recent turns the orchestrator sees when deciding
    #[serde(default = "default_decision_window")]
    pub decision_window: usize,
}

fn default_router_provider() -> Option<String> {
    Some("openai".into())
}
fn default_router_model() -> String {
    "gpt-4o-mini".into()
}
fn default_long_message_threshold() -> usize {
    600
}
fn default_decision_window() -> usize {
    6
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            provider: default_router_provider(),
            model: default_router_model(),
            long_message_threshold: default_long_message_threshold(),
            decision_window: default_decision_window(),
        }
    }
}

/// Memory assembler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// How many recent raw messages the assembler returns (layer 3 window)
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

fn default_recent_window() -> usize {
    15
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
        }
    }
}

/// Summarizer (background compaction) settings.
///
/// The trigger arithmetic is policy, not law: compaction fires when
/// `history.len() >= min_messages && history.len() % cadence == 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Which configured provider hosts the summarization model
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,

    /// The summarization model
    #[serde(default = "default_summarizer_model")]
    pub model: String,

    /// Minimum stored history length before compaction is considered
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,

    /// Compaction runs only when the history length is a multiple of this
    #[serde(default = "default_cadence")]
    pub cadence: usize,

    /// How many of the oldest messages each compaction folds into the summary
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_summarizer_provider() -> String {
    "openai".into()
}
fn default_summarizer_model() -> String {
    "gpt-4o-mini".into()
}
fn default_min_messages() -> usize {
    12
}
fn default_cadence() -> usize {
    4
}
fn default_batch_size() -> usize {
    8
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: default_summarizer_model(),
            min_messages: default_min_messages(),
            cadence: default_cadence(),
            batch_size: default_batch_size(),
        }
    }
}

/// Conversation store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend: "sqlite" or "in_memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "switchboard.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides. A missing file is not an error — the environment alone can
    /// configure a working process.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p).map_err(|e| ConfigError::Io {
                    path: p.display().to_string(),
                    source: e,
                })?;
                toml::from_str(&raw)?
            }
            _ => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Add providers discovered from environment presence checks.
    ///
    /// File-configured providers win; the environment only fills gaps and
    /// supplies missing API keys.
    pub fn apply_env(&mut self) {
        let discovered = [
            ("openai", ProviderFamily::OpenAi, "OPENAI_API_KEY", None, "gpt-4o", vec!["gpt-4o-mini"]),
            ("google", ProviderFamily::Google, "GEMINI_API_KEY", None, "gemini-1.5-pro", vec!["gemini-1.5-flash"]),
            ("grok", ProviderFamily::OpenAi, "XAI_API_KEY", Some("https://api.x.ai/v1"), "grok-2-1212", vec![]),
        ];

        for (name, family, env_var, api_url, flagship, fallbacks) in discovered {
            let Ok(key) = std::env::var(env_var) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }

            if let Some(existing) = self.providers.iter_mut().find(|p| p.name == name) {
                if existing.api_key.is_none() {
                    existing.api_key = Some(key);
                }
                continue;
            }

            debug!(provider = name, "Provider discovered from environment");
            self.providers.push(ProviderConfig {
                name: name.into(),
                family,
                api_key: Some(key),
                api_url: api_url.map(String::from),
                flagship_model: flagship.into(),
                fallback_models: fallbacks.into_iter().map(String::from).collect(),
            });
        }
    }

    /// Check invariants that would otherwise surface as confusing runtime
    /// behavior.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider at index {i} has an empty name"
                )));
            }
            if provider.flagship_model.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' has an empty flagship_model",
                    provider.name
                )));
            }
            if self.providers[..i].iter().any(|p| p.name == provider.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
        }

        if self.summarizer.cadence == 0 {
            return Err(ConfigError::Invalid(
                "summarizer.cadence must be at least 1".into(),
            ));
        }
        if self.summarizer.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "summarizer.batch_size must be at least 1".into(),
            ));
        }
        if self.summarizer.batch_size >= self.summarizer.min_messages {
            return Err(ConfigError::Invalid(format!(
                "summarizer.batch_size ({}) must be smaller than summarizer.min_messages ({}) so a tail always remains",
                self.summarizer.batch_size, self.summarizer.min_messages
            )));
        }

        if self.memory.recent_window == 0 {
            return Err(ConfigError::Invalid(
                "memory.recent_window must be at least 1".into(),
            ));
        }

        match self.store.backend.as_str() {
            "sqlite" | "in_memory" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown store backend '{other}' (expected 'sqlite' or 'in_memory')"
                )));
            }
        }

        Ok(())
    }

    /// Look up a configured provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// The fallback model list for a provider, empty if unknown.
    pub fn fallback_models(&self, provider_name: &str) -> &[String] {
        self.provider(provider_name)
            .map(|p| p.fallback_models.as_slice())
            .unwrap_or(&[])
    }
}
