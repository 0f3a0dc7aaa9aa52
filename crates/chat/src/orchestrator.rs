//! The chat turn pipeline.
//!
//! Per inbound user message: validate → assemble context → route → persist
//! the user message → generate → persist the assistant message → respond →
//! fire-and-forget compaction.
//!
//! The user message is persisted *before* generation so a failed backend
//! call never loses it. Both persistence steps are compare-and-swap writes
//! with a bounded retry, so concurrent turns on the same chat surface as
//! logged conflicts instead of silent lost updates.

use std::collections::HashMap;
use std::sync::Arc;
use switchboard_config::AppConfig;
use switchboard_core::error::{Error, ProviderError, Result, StoreError};
use switchboard_core::message::{Asset, ChatId, Message};
use switchboard_core::provider::{GenerateRequest, StreamChunk, Usage};
use switchboard_core::store::ConversationStore;
use switchboard_providers::{ProviderRegistry, generate_with_fallbacks, stream_with_fallbacks};
use switchboard_router::{ManualOverride, MasterRouter, RouteInput, RoutingDecision};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::assembler::MemoryAssembler;
use crate::stream_event::ChatStreamEvent;
use crate::summarizer::Summarizer;

/// How many times a conflicted chat write is retried before giving up.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// One inbound chat turn.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TurnRequest {
    pub actor_id: String,
    pub chat_id: String,
    pub message: String,

    /// Explicit provider choice; requires `override_model`
    #[serde(default)]
    pub override_provider: Option<String>,

    /// Explicit model choice
    #[serde(default)]
    pub override_model: Option<String>,
}

impl TurnRequest {
    /// Reject malformed requests before any provider or store work happens.
    pub fn validate(&self) -> Result<()> {
        require("actor_id", &self.actor_id)?;
        require("chat_id", &self.chat_id)?;
        require("message", &self.message)?;

        match (&self.override_provider, &self.override_model) {
            (Some(_), None) => Err(Error::Validation(
                "override_provider supplied without override_model".into(),
            )),
            (None, Some(_)) => Err(Error::Validation(
                "override_model supplied without override_provider".into(),
            )),
            _ => Ok(()),
        }
    }

    fn override_choice(&self) -> Option<ManualOverride> {
        match (&self.override_provider, &self.override_model) {
            (Some(provider), Some(model)) => Some(ManualOverride {
                provider: provider.clone(),
                model: model.clone(),
            }),
            _ => None,
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!(
            "missing or empty field '{field}'"
        )));
    }
    Ok(())
}

/// The completed (non-streamed) turn.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Composes assembler, router, providers, store, and summarizer for one
/// chat turn.
pub struct ChatOrchestrator {
    store: Arc<dyn ConversationStore>,
    registry: Arc<ProviderRegistry>,
    router: Arc<MasterRouter>,
    assembler: MemoryAssembler,
    summarizer: Option<Arc<Summarizer>>,
    /// Static per-provider model fallback lists
    fallbacks: HashMap<String, Vec<String>>,
}

impl ChatOrchestrator {
    /// Create an orchestrator from explicit parts.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        registry: Arc<ProviderRegistry>,
        router: Arc<MasterRouter>,
        assembler: MemoryAssembler,
        summarizer: Option<Arc<Summarizer>>,
        fallbacks: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            store,
            registry,
            router,
            assembler,
            summarizer,
            fallbacks,
        }
    }

    /// Wire the whole pipeline from application configuration.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        let router = Arc::new(MasterRouter::from_config(config, registry.clone()));
        let assembler = MemoryAssembler::new(store.clone(), config.memory.recent_window);
        let summarizer =
            Summarizer::from_config(&config.summarizer, &registry, store.clone()).map(Arc::new);
        let fallbacks = config
            .providers
            .iter()
            .map(|p| (p.name.clone(), p.fallback_models.clone()))
            .collect();

        Self::new(store, registry, router, assembler, summarizer, fallbacks)
    }

    /// Handle one turn, returning the whole reply at once.
    pub async fn handle(&self, request: TurnRequest) -> Result<TurnResponse> {
        let (chat_id, ctx, decision) = self.prepare(&request).await?;

        let adapter = self.registry.get(&decision.provider).ok_or_else(|| {
            Error::ProviderConfiguration(format!(
                "decided provider '{}' is not registered",
                decision.provider
            ))
        })?;

        // Persist the user message first so a failed generation can't lose it.
        append_with_retry(
            &self.store,
            &chat_id,
            Message::user(chat_id.clone(), request.message.as_str()),
        )
        .await?;

        let gen_request = GenerateRequest {
            model: decision.model.clone(),
            persona: ctx.persona,
            summary: ctx.summary,
            history: ctx.recent_history,
            user_message: request.message.clone(),
            temperature: 0.7,
            max_tokens: None,
        };

        let response =
            generate_with_fallbacks(&adapter, gen_request, self.fallbacks_for(&decision.provider))
                .await
                .map_err(Error::Provider)?;

        let assistant = Message::assistant(chat_id.clone(), response.text.as_str(), &response.model)
            .with_assets(response.assets.clone());
        append_with_retry(&self.store, &chat_id, assistant).await?;

        info!(
            chat_id = %chat_id,
            provider = %decision.provider,
            model = %response.model,
            "Turn complete"
        );

        spawn_compaction(self.summarizer.clone(), chat_id);

        Ok(TurnResponse {
            text: response.text,
            provider: decision.provider,
            model: response.model,
            reasoning: decision.reasoning,
            assets: response.assets,
            usage: response.usage,
        })
    }

    /// Handle one turn as a stream of typed frames.
    ///
    /// The returned receiver yields a `metadata` frame, then `content`
    /// frames, then `done`. The full reply accumulates inside the pump task
    /// and is persisted exactly once when the upstream stream completes —
    /// a client that disconnects mid-stream does not stop accumulation or
    /// persistence. If the upstream call fails before producing any
    /// content, nothing is persisted beyond the user message.
    pub async fn handle_stream(
        &self,
        request: TurnRequest,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        let (chat_id, ctx, decision) = self.prepare(&request).await?;

        let adapter = self.registry.get(&decision.provider).ok_or_else(|| {
            Error::ProviderConfiguration(format!(
                "decided provider '{}' is not registered",
                decision.provider
            ))
        })?;

        append_with_retry(
            &self.store,
            &chat_id,
            Message::user(chat_id.clone(), request.message.as_str()),
        )
        .await?;

        let gen_request = GenerateRequest {
            model: decision.model.clone(),
            persona: ctx.persona,
            summary: ctx.summary,
            history: ctx.recent_history,
            user_message: request.message.clone(),
            temperature: 0.7,
            max_tokens: None,
        };

        let upstream =
            stream_with_fallbacks(&adapter, gen_request, self.fallbacks_for(&decision.provider))
                .await
                .map_err(Error::Provider)?;

        let (tx, rx) = mpsc::channel(64);
        let store = self.store.clone();
        let summarizer = self.summarizer.clone();
        tokio::spawn(pump_stream(
            upstream, tx, store, summarizer, chat_id, decision,
        ));

        Ok(rx)
    }

    /// The shared head of both turn variants: validate, assemble, route.
    async fn prepare(
        &self,
        request: &TurnRequest,
    ) -> Result<(ChatId, crate::assembler::AssembledContext, RoutingDecision)> {
        request.validate()?;

        if self.registry.is_empty() {
            return Err(Error::ProviderConfiguration(
                "no providers configured".into(),
            ));
        }

        let chat_id = ChatId::from(&request.chat_id);
        let ctx = self.assembler.assemble(&request.actor_id, &chat_id).await?;

        let decision = self
            .router
            .decide(&RouteInput {
                message: request.message.clone(),
                persona: ctx.persona.clone(),
                recent_history: ctx.recent_history.clone(),
                override_choice: request.override_choice(),
            })
            .await?;

        debug!(
            chat_id = %chat_id,
            provider = %decision.provider,
            model = %decision.model,
            reasoning = %decision.reasoning,
            "Routing decision"
        );

        Ok((chat_id, ctx, decision))
    }

    fn fallbacks_for(&self, provider: &str) -> &[String] {
        self.fallbacks
            .get(provider)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Append one message to a chat with a compare-and-swap retry loop.
///
/// Conflicts are logged and retried against a fresh read, so two concurrent
/// turns on the same chat both land instead of silently overwriting each
/// other.
async fn append_with_retry(
    store: &Arc<dyn ConversationStore>,
    chat_id: &ChatId,
    message: Message,
) -> Result<u64> {
    let mut last_conflict: Option<StoreError> = None;

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut chat = store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat '{chat_id}'")))?;

        chat.push(message.clone());

        match store.put_chat(chat).await {
            Ok(version) => return Ok(version),
            Err(conflict @ StoreError::WriteConflict { .. }) => {
                warn!(
                    chat_id = %chat_id,
                    attempt,
                    max_attempts = MAX_WRITE_ATTEMPTS,
                    "Chat write conflict, retrying against fresh read"
                );
                last_conflict = Some(conflict);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(last_conflict
        .map(Error::Store)
        .unwrap_or_else(|| Error::Internal("write retry loop exited without error".into())))
}

/// Drive one upstream stream: forward frames, accumulate the reply, persist
/// exactly once, then kick compaction.
async fn pump_stream(
    mut upstream: mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
    tx: mpsc::Sender<ChatStreamEvent>,
    store: Arc<dyn ConversationStore>,
    summarizer: Option<Arc<Summarizer>>,
    chat_id: ChatId,
    decision: RoutingDecision,
) {
    // Send failures mean the client went away; accumulation and
    // persistence continue regardless.
    let _ = tx
        .send(ChatStreamEvent::Metadata {
            provider: decision.provider.clone(),
            model: decision.model.clone(),
            reasoning: decision.reasoning.clone(),
        })
        .await;

    let mut text = String::new();
    let mut assets: Vec<Asset> = Vec::new();
    let mut usage: Option<Usage> = None;
    let mut upstream_error: Option<ProviderError> = None;

    while let Some(chunk) = upstream.recv().await {
        match chunk {
            Ok(chunk) => {
                if let Some(t) = &chunk.text {
                    text.push_str(t);
                }
                assets.extend(chunk.assets.iter().cloned());
                if chunk.usage.is_some() {
                    usage = chunk.usage.clone();
                }

                let has_content = chunk.text.as_deref().is_some_and(|t| !t.is_empty());
                if has_content || !chunk.assets.is_empty() {
                    let _ = tx
                        .send(ChatStreamEvent::Content {
                            text: chunk.text.unwrap_or_default(),
                            assets: chunk.assets,
                        })
                        .await;
                }

                if chunk.done {
                    break;
                }
            }
            Err(e) => {
                upstream_error = Some(e);
                break;
            }
        }
    }

    if let Some(e) = &upstream_error {
        if text.is_empty() && assets.is_empty() {
            // Nothing was produced: skip persistence entirely.
            warn!(chat_id = %chat_id, error = %e, "Stream failed before any content");
            let _ = tx
                .send(ChatStreamEvent::Error {
                    message: e.to_string(),
                })
                .await;
            return;
        }
        warn!(
            chat_id = %chat_id,
            error = %e,
            accumulated = text.len(),
            "Stream interrupted after partial content; persisting the prefix"
        );
    }

    let message = Message::assistant(chat_id.clone(), text.as_str(), &decision.model)
        .with_assets(assets);

    match append_with_retry(&store, &chat_id, message).await {
        Ok(_) => {
            if let Some(e) = upstream_error {
                let _ = tx
                    .send(ChatStreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            } else {
                let _ = tx.send(ChatStreamEvent::Done { usage }).await;
            }
            spawn_compaction(summarizer, chat_id);
        }
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "Failed to persist streamed reply");
            let _ = tx
                .send(ChatStreamEvent::Error {
                    message: format!("failed to persist reply: {e}"),
                })
                .await;
        }
    }
}

/// Kick off background compaction. Never blocks the response; failures are
/// logged, never surfaced to the end user.
fn spawn_compaction(summarizer: Option<Arc<Summarizer>>, chat_id: ChatId) {
    let Some(summarizer) = summarizer else {
        return;
    };

    tokio::spawn(async move {
        match summarizer.maybe_compact(&chat_id).await {
            Ok(outcome) => debug!(chat_id = %chat_id, ?outcome, "Compaction pass finished"),
            Err(e) => warn!(chat_id = %chat_id, error = %e, "Compaction failed"),
        }
    });
}
