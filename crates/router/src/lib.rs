//! Master router — selects which provider and model answer each message.
//!
//! A state machine over one decision, tried in strict priority order:
//!
//! 1. **Manual override** — the caller named a `(provider, model)` pair
//! 2. **Single-provider short-circuit** — only one adapter is configured
//! 3. **Orchestrator query** — a designated routing model picks from the
//!    live manifest of `provider:model` pairs
//! 4. **Heuristic fallback** — length-based family preference
//!
//! Each branch is tried at most once per call; there is no retry loop. Every
//! failure past the override branch degrades to a lower-priority branch, so
//! a decision is always produced as long as at least one provider is
//! configured. The only error surfaced to callers is a manual override
//! naming an unconfigured provider.

pub mod parse;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_config::{AppConfig, RouterConfig};
use switchboard_core::capability::CapabilityRegistry;
use switchboard_core::error::{Error, Result};
use switchboard_core::message::{Message, Role};
use switchboard_core::provider::{GenerateRequest, ProviderAdapter, ProviderFamily};
use switchboard_providers::{ProviderModels, ProviderRegistry};
use tracing::{debug, info, warn};

use crate::parse::{ParsedDecision, parse_decision};

/// The routing outcome for one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Which adapter answers
    pub provider: String,

    /// Which model on that adapter
    pub model: String,

    /// Which branch fired and why — always populated, surfaced to the
    /// caller for observability
    pub reasoning: String,
}

/// A caller-supplied explicit routing choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualOverride {
    pub provider: String,
    pub model: String,
}

/// Decision-time context for one routing call.
#[derive(Debug, Clone)]
pub struct RouteInput {
    /// The current user message
    pub message: String,

    /// The actor's persona
    pub persona: String,

    /// Recent raw turns, oldest first (truncated to the decision window
    /// before being shown to the orchestrator)
    pub recent_history: Vec<Message>,

    /// Explicit caller override, if any
    pub override_choice: Option<ManualOverride>,
}

/// The live `provider:model` manifest for one decision.
///
/// Fetched fresh per decision — availability can change between calls, so
/// nothing here is cached.
struct Manifest {
    entries: Vec<ProviderModels>,
}

impl Manifest {
    fn render(&self) -> String {
        self.entries
            .iter()
            .flat_map(|e| {
                e.models
                    .iter()
                    .map(move |m| format!("{}:{}", e.provider, m))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn models_for(&self, provider: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.provider == provider)
            .map(|e| e.models.as_slice())
            .unwrap_or(&[])
    }

    fn contains(&self, provider: &str, model: &str) -> bool {
        self.models_for(provider).iter().any(|m| m == model)
    }
}

/// The master router.
pub struct MasterRouter {
    registry: Arc<ProviderRegistry>,
    capabilities: CapabilityRegistry,
    config: RouterConfig,
    /// Statically configured default model per provider name
    flagships: HashMap<String, String>,
}

impl MasterRouter {
    /// Create a router over a registry.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        capabilities: CapabilityRegistry,
        config: RouterConfig,
        flagships: HashMap<String, String>,
    ) -> Self {
        Self {
            registry,
            capabilities,
            config,
            flagships,
        }
    }

    /// Build a router from application configuration.
    pub fn from_config(config: &AppConfig, registry: Arc<ProviderRegistry>) -> Self {
        let capabilities = if config.capabilities.is_empty() {
            CapabilityRegistry::defaults()
        } else {
            CapabilityRegistry::new(config.capabilities.clone())
        };

        let flagships = config
            .providers
            .iter()
            .map(|p| (p.name.clone(), p.flagship_model.clone()))
            .collect();

        Self::new(registry, capabilities, config.router.clone(), flagships)
    }

    /// Decide which provider and model answer this message.
    pub async fn decide(&self, input: &RouteInput) -> Result<RoutingDecision> {
        // Branch 1: manual override. The only branch that can error.
        if let Some(choice) = &input.override_choice {
            return self.manual_override(choice);
        }

        // Callers must reject requests before routing when nothing is
        // configured; this is a defensive backstop.
        if self.registry.is_empty() {
            return Err(Error::ProviderConfiguration(
                "no providers configured".into(),
            ));
        }

        // Branch 2: single-provider short-circuit — no LLM call when there
        // is no real choice.
        if self.registry.len() == 1 {
            return Ok(self.single_provider().await);
        }

        // Branches 3 and 4 share the manifest, fetched fresh per decision.
        let manifest = self.fetch_manifest().await;

        match self.orchestrator_query(input, &manifest).await {
            Ok(decision) => Ok(decision),
            Err(cause) => {
                debug!(cause = %cause, "Routing degraded to heuristic");
                Ok(self.heuristic(input, &manifest, &cause))
            }
        }
    }

    // ── Branch 1: manual override ─────────────────────────────────────────

    fn manual_override(&self, choice: &ManualOverride) -> Result<RoutingDecision> {
        if self.registry.get(&choice.provider).is_none() {
            return Err(Error::ProviderConfiguration(format!(
                "override names unconfigured provider '{}'",
                choice.provider
            )));
        }

        info!(
            provider = %choice.provider,
            model = %choice.model,
            "Routing: manual override"
        );

        Ok(RoutingDecision {
            provider: choice.provider.clone(),
            model: choice.model.clone(),
            reasoning: "manual override supplied by caller".into(),
        })
    }

    // ── Branch 2: single-provider short-circuit ───────────────────────────

    async fn single_provider(&self) -> RoutingDecision {
        // len() == 1 was checked by the caller
        let adapter = self
            .registry
            .first()
            .expect("registry checked non-empty");

        let live = adapter.list_models().await;
        let model = self.default_model(adapter.name(), &live);

        RoutingDecision {
            provider: adapter.name().to_string(),
            model,
            reasoning: format!(
                "single provider '{}' configured; selected its default model without a routing query",
                adapter.name()
            ),
        }
    }

    // ── Branch 3: orchestrator query ──────────────────────────────────────

    async fn fetch_manifest(&self) -> Manifest {
        Manifest {
            entries: self.registry.available_models().await,
        }
    }

    /// Ask the orchestrator model to choose. Returns the degradation cause
    /// on any failure — transport error, invalid reply, unknown provider —
    /// which feeds the heuristic branch.
    async fn orchestrator_query(
        &self,
        input: &RouteInput,
        manifest: &Manifest,
    ) -> std::result::Result<RoutingDecision, String> {
        // An empty name in the config file also disables the query —
        // TOML has no way to spell `None`.
        let Some(provider_name) = self
            .config
            .provider
            .as_deref()
            .filter(|p| !p.is_empty())
        else {
            return Err("no routing-capable provider configured".into());
        };

        let Some(orchestrator) = self.registry.get(provider_name) else {
            return Err(format!(
                "routing provider '{provider_name}' is not configured"
            ));
        };

        let request = GenerateRequest {
            model: self.config.model.clone(),
            persona: self.routing_instruction(),
            summary: "(not applicable)".into(),
            history: Vec::new(),
            user_message: self.routing_context(input, manifest),
            temperature: 0.0,
            max_tokens: Some(64),
        };

        let reply = orchestrator
            .generate(request)
            .await
            .map_err(|e| format!("orchestrator call failed: {e}"))?;

        let (provider, model) = match parse_decision(&reply.text) {
            ParsedDecision::Choice { provider, model } => (provider, model),
            ParsedDecision::Invalid => {
                warn!(reply = %reply.text, "Orchestrator reply did not match any accepted shape");
                return Err("orchestrator reply was invalid".into());
            }
        };

        if self.registry.get(&provider).is_none() {
            return Err(format!(
                "orchestrator chose unknown provider '{provider}'"
            ));
        }

        if manifest.contains(&provider, &model) {
            info!(provider = %provider, model = %model, "Routing: orchestrator decision");
            return Ok(RoutingDecision {
                reasoning: format!("orchestrator selected {provider}:{model}"),
                provider,
                model,
            });
        }

        // The provider is real but the model arm isn't in this turn's
        // manifest: substitute the provider's default model rather than
        // rejecting the whole decision.
        let substitute = self.default_model(&provider, manifest.models_for(&provider));
        info!(
            provider = %provider,
            rejected_model = %model,
            model = %substitute,
            "Routing: orchestrator model arm not in manifest, substituted default"
        );
        Ok(RoutingDecision {
            reasoning: format!(
                "orchestrator chose provider '{provider}' but model '{model}' is not in the live manifest; substituted default '{substitute}'"
            ),
            provider,
            model: substitute,
        })
    }

    /// The orchestrator's system instruction: capability registry, the
    /// manifest constraint, and the image-generation rule.
    fn routing_instruction(&self) -> String {
        let google_providers: Vec<&str> = self
            .registry
            .iter()
            .filter(|a| a.family() == ProviderFamily::Google)
            .map(|a| a.name())
            .collect();

        let google_clause = if google_providers.is_empty() {
            "No Google-family provider is configured; never route image generation requests."
                .to_string()
        } else {
            format!(
                "Only a Google-family provider may be chosen when the final intent of the message is image generation. Google-family providers: {}.",
                google_providers.join(", ")
            )
        };

        format!(
            "You are a routing model for a multi-backend chat system. Choose which provider and model should answer the user's message.\n\n\
             Model strengths:\n{}\n\n\
             Rules:\n\
             - Answer with exactly one option in the format provider:model, chosen strictly from the allowed options. No prose, no explanation.\n\
             - {}\n\
             - Prefer long-context models for long-form synthesis and analysis; prefer coding and logic models for code and structured reasoning.",
            self.capabilities.render(),
            google_clause,
        )
    }

    /// The decision-time context: persona, truncated recent history, the
    /// current message, and the allowed options.
    fn routing_context(&self, input: &RouteInput, manifest: &Manifest) -> String {
        let window = self.config.decision_window;
        let start = input.recent_history.len().saturating_sub(window);
        let transcript = input.recent_history[start..]
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "USER",
                    Role::Assistant => "ASSISTANT",
                };
                format!("{role}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Persona:\n{}\n\nRecent turns:\n{}\n\nMessage:\n{}\n\nAllowed options: {}",
            input.persona,
            if transcript.is_empty() {
                "(none)"
            } else {
                &transcript
            },
            input.message,
            manifest.render(),
        )
    }

    // ── Branch 4: heuristic fallback ──────────────────────────────────────

    fn heuristic(&self, input: &RouteInput, manifest: &Manifest, cause: &str) -> RoutingDecision {
        let long = input.message.chars().count() > self.config.long_message_threshold;

        let adapter = if long {
            self.registry.first_of_family(ProviderFamily::Google)
        } else {
            None
        }
        .or_else(|| self.registry.first_of_family(ProviderFamily::OpenAi))
        .or_else(|| self.registry.first())
        .expect("registry checked non-empty");

        let model = self.default_model(adapter.name(), manifest.models_for(adapter.name()));

        let preference = if long {
            "long message preferred the long-context family"
        } else {
            "short message preferred the primary family"
        };

        info!(
            provider = adapter.name(),
            model = %model,
            cause = %cause,
            "Routing: heuristic fallback"
        );

        RoutingDecision {
            provider: adapter.name().to_string(),
            model,
            reasoning: format!(
                "heuristic fallback ({cause}); {preference}, selected '{}'",
                adapter.name()
            ),
        }
    }

    // ── Default model selection ───────────────────────────────────────────

    /// The provider's flagship if it appears in the live list (or the list
    /// couldn't be fetched); otherwise the first live model.
    fn default_model(&self, provider_name: &str, live_models: &[String]) -> String {
        if let Some(flagship) = self.flagships.get(provider_name) {
            if live_models.is_empty() || live_models.iter().any(|m| m == flagship) {
                return flagship.clone();
            }
        }

        live_models
            .first()
            .cloned()
            .or_else(|| self.flagships.get(provider_name).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchboard_core::error::ProviderError;
    use switchboard_core::message::ChatId;
    use switchboard_core::provider::{GenerateResponse, ProviderAdapter};

    /// A scriptable adapter: fixed model list, scripted generate reply,
    /// call counting.
    struct MockAdapter {
        name: String,
        family: ProviderFamily,
        models: Vec<String>,
        reply: Option<String>,
        generate_calls: AtomicUsize,
        fail_generate: bool,
        asked_prompts: Mutex<Vec<String>>,
    }

    impl MockAdapter {
        fn new(name: &str, family: ProviderFamily, models: &[&str]) -> Self {
            Self {
                name: name.into(),
                family,
                models: models.iter().map(|s| s.to_string()).collect(),
                reply: None,
                generate_calls: AtomicUsize::new(0),
                fail_generate: false,
                asked_prompts: Mutex::new(Vec::new()),
            }
        }

        fn with_reply(mut self, reply: &str) -> Self {
            self.reply = Some(reply.into());
            self
        }

        fn failing(mut self) -> Self {
            self.fail_generate = true;
            self
        }

        fn calls(&self) -> usize {
            self.generate_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn family(&self) -> ProviderFamily {
            self.family
        }

        async fn list_models(&self) -> Vec<String> {
            self.models.clone()
        }

        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> std::result::Result<GenerateResponse, ProviderError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.asked_prompts
                .lock()
                .unwrap()
                .push(format!("{}\n---\n{}", request.persona, request.user_message));

            if self.fail_generate {
                return Err(ProviderError::Network("connection refused".into()));
            }

            Ok(GenerateResponse {
                text: self.reply.clone().unwrap_or_default(),
                model: request.model,
                provider: self.name.clone(),
                assets: vec![],
                usage: None,
            })
        }
    }

    fn flagships(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn router_config(provider: Option<&str>) -> RouterConfig {
        RouterConfig {
            provider: provider.map(String::from),
            model: "router-mini".into(),
            long_message_threshold: 600,
            decision_window: 6,
        }
    }

    fn input(message: &str) -> RouteInput {
        RouteInput {
            message: message.into(),
            persona: "You are concise.".into(),
            recent_history: vec![],
            override_choice: None,
        }
    }

    fn build_router(
        adapters: Vec<Arc<MockAdapter>>,
        orchestrator_provider: Option<&str>,
        flagship_pairs: &[(&str, &str)],
    ) -> MasterRouter {
        let mut registry = ProviderRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        MasterRouter::new(
            Arc::new(registry),
            CapabilityRegistry::defaults(),
            router_config(orchestrator_provider),
            flagships(flagship_pairs),
        )
    }

    // ── Branch 1: manual override ─────────────────────────────────────

    #[tokio::test]
    async fn manual_override_is_exact_with_no_orchestrator_call() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o", "gpt-4o-mini"])
                .with_reply("google:gemini-1.5-pro"),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai.clone(), google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let mut req = input("Hello");
        req.override_choice = Some(ManualOverride {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
        });

        let decision = router.decide(&req).await.unwrap();
        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model, "gpt-4o-mini");
        assert!(decision.reasoning.contains("manual override"));
        assert_eq!(openai.calls(), 0);
    }

    #[tokio::test]
    async fn manual_override_unknown_provider_is_an_error() {
        let openai = Arc::new(MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"]));
        let router = build_router(vec![openai], Some("openai"), &[("openai", "gpt-4o")]);

        let mut req = input("Hello");
        req.override_choice = Some(ManualOverride {
            provider: "anthropic".into(),
            model: "claude-3".into(),
        });

        let err = router.decide(&req).await.unwrap_err();
        assert!(matches!(err, Error::ProviderConfiguration(_)));
        assert!(err.to_string().contains("anthropic"));
    }

    // ── Branch 2: single provider ─────────────────────────────────────

    #[tokio::test]
    async fn single_provider_short_circuits_to_flagship() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o", "gpt-4o-mini"])
                .failing(), // any generate call would error the test
        );
        let router = build_router(vec![openai.clone()], Some("openai"), &[("openai", "gpt-4o")]);

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model, "gpt-4o");
        assert!(decision.reasoning.contains("single provider"));
        assert_eq!(openai.calls(), 0);
    }

    #[tokio::test]
    async fn single_provider_flagship_missing_falls_to_first_live_model() {
        let openai = Arc::new(MockAdapter::new(
            "openai",
            ProviderFamily::OpenAi,
            &["gpt-4.1", "gpt-4o-mini"],
        ));
        let router = build_router(vec![openai], Some("openai"), &[("openai", "gpt-4o")]);

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.model, "gpt-4.1");
    }

    #[tokio::test]
    async fn single_provider_empty_live_list_keeps_flagship() {
        let openai = Arc::new(MockAdapter::new("openai", ProviderFamily::OpenAi, &[]));
        let router = build_router(vec![openai], Some("openai"), &[("openai", "gpt-4o")]);

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.model, "gpt-4o");
    }

    // ── Branch 3: orchestrator query ──────────────────────────────────

    #[tokio::test]
    async fn orchestrator_token_reply_decides() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"])
                .with_reply("google:gemini-1.5-flash"),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro", "gemini-1.5-flash"],
        ));
        let router = build_router(
            vec![openai.clone(), google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.provider, "google");
        assert_eq!(decision.model, "gemini-1.5-flash");
        assert!(decision.reasoning.contains("orchestrator"));
        assert_eq!(openai.calls(), 1);
    }

    #[tokio::test]
    async fn orchestrator_json_reply_decides() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"])
                .with_reply(r#"{"provider": "openai", "model": "gpt-4o"}"#),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai, google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model, "gpt-4o");
    }

    #[tokio::test]
    async fn orchestrator_prompt_embeds_manifest_and_rules() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"])
                .with_reply("openai:gpt-4o"),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai.clone(), google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        router.decide(&input("Hello")).await.unwrap();

        let prompts = openai.asked_prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("openai:gpt-4o"));
        assert!(prompt.contains("google:gemini-1.5-pro"));
        assert!(prompt.contains("image generation"));
        assert!(prompt.contains("You are concise.")); // persona passed through
    }

    #[tokio::test]
    async fn unknown_model_arm_substitutes_provider_default() {
        // Scenario from the contract: "openai:gpt-9-ultra" where gpt-9-ultra
        // is not in this turn's manifest.
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o", "gpt-4o-mini"])
                .with_reply("openai:gpt-9-ultra"),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai, google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.provider, "openai");
        assert_eq!(decision.model, "gpt-4o");
        assert!(decision.reasoning.contains("gpt-9-ultra"));
        assert!(decision.reasoning.contains("substituted"));
    }

    #[tokio::test]
    async fn unknown_provider_in_reply_degrades_to_heuristic() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"])
                .with_reply("anthropic:claude-3-opus"),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai, google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert!(decision.reasoning.contains("heuristic"));
        assert_eq!(decision.provider, "openai"); // short message → primary family
    }

    #[tokio::test]
    async fn invalid_reply_degrades_to_heuristic() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"])
                .with_reply("I think GPT-4o would be best here."),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai, google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert!(decision.reasoning.contains("heuristic"));
        assert!(decision.reasoning.contains("invalid"));
    }

    #[tokio::test]
    async fn orchestrator_transport_error_degrades_to_heuristic() {
        let openai = Arc::new(
            MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"]).failing(),
        );
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai, google],
            Some("openai"),
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert!(decision.reasoning.contains("heuristic"));
        assert!(decision.reasoning.contains("orchestrator call failed"));
    }

    // ── Branch 4: heuristic fallback ──────────────────────────────────

    #[tokio::test]
    async fn no_routing_provider_goes_straight_to_heuristic() {
        let openai = Arc::new(MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"]));
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai.clone(), google],
            None,
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert!(decision.reasoning.contains("heuristic"));
        assert_eq!(openai.calls(), 0);
    }

    #[tokio::test]
    async fn long_message_prefers_google_family() {
        let openai = Arc::new(MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"]));
        let google = Arc::new(MockAdapter::new(
            "google",
            ProviderFamily::Google,
            &["gemini-1.5-pro"],
        ));
        let router = build_router(
            vec![openai, google],
            None,
            &[("openai", "gpt-4o"), ("google", "gemini-1.5-pro")],
        );

        let long_message = "x".repeat(601);
        let decision = router.decide(&input(&long_message)).await.unwrap();
        assert_eq!(decision.provider, "google");
        assert_eq!(decision.model, "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn long_message_without_google_falls_to_openai_family() {
        let grok = Arc::new(MockAdapter::new("grok", ProviderFamily::OpenAi, &["grok-2-1212"]));
        let other = Arc::new(MockAdapter::new("other", ProviderFamily::OpenAi, &["m1"]));
        let router = build_router(
            vec![grok, other],
            None,
            &[("grok", "grok-2-1212"), ("other", "m1")],
        );

        let long_message = "x".repeat(601);
        let decision = router.decide(&input(&long_message)).await.unwrap();
        assert_eq!(decision.provider, "grok"); // first OpenAI-family in config order
    }

    #[tokio::test]
    async fn heuristic_without_preferred_family_picks_first_configured() {
        let g1 = Arc::new(MockAdapter::new("google-eu", ProviderFamily::Google, &["gemini-1.5-pro"]));
        let g2 = Arc::new(MockAdapter::new("google-us", ProviderFamily::Google, &["gemini-1.5-pro"]));
        let router = build_router(
            vec![g1, g2],
            None,
            &[("google-eu", "gemini-1.5-pro"), ("google-us", "gemini-1.5-pro")],
        );

        // Short message prefers OpenAI family; none configured → first.
        let decision = router.decide(&input("Hello")).await.unwrap();
        assert_eq!(decision.provider, "google-eu");
    }

    #[tokio::test]
    async fn empty_registry_is_rejected() {
        let router = MasterRouter::new(
            Arc::new(ProviderRegistry::new()),
            CapabilityRegistry::defaults(),
            router_config(None),
            HashMap::new(),
        );

        let err = router.decide(&input("Hello")).await.unwrap_err();
        assert!(matches!(err, Error::ProviderConfiguration(_)));
    }

    #[tokio::test]
    async fn reasoning_is_never_empty() {
        let openai = Arc::new(MockAdapter::new("openai", ProviderFamily::OpenAi, &["gpt-4o"]));
        let router = build_router(vec![openai], Some("openai"), &[("openai", "gpt-4o")]);

        let decision = router.decide(&input("Hello")).await.unwrap();
        assert!(!decision.reasoning.is_empty());
    }
}
