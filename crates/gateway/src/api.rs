//! v1 API — chat turns, model discovery, actor and chat management.
//!
//! Endpoints:
//!
//! - `POST /v1/chat`               — Send a message, get the whole reply
//! - `POST /v1/chat/stream`        — Send a message, get typed SSE frames
//! - `GET  /v1/models`             — Live model lists per provider
//! - `POST /v1/actors`             — Create an actor
//! - `GET  /v1/actors/{id}`        — Fetch an actor
//! - `GET  /v1/actors/{id}/chats`  — List an actor's chats
//! - `POST /v1/chats`              — Create a chat for an actor
//! - `GET  /v1/chats/{id}`         — Fetch a chat with its history
//!
//! Failures always carry `{error}` with an error status — a failed turn is
//! never reported as a successful empty answer.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use switchboard_chat::{TurnRequest, TurnResponse};
use switchboard_core::error::Error;
use switchboard_core::message::{Actor, Asset, ChatId, ChatState, Message, Role};
use switchboard_core::store::ConversationStore;
use switchboard_providers::ProviderModels;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::SharedState;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/models", get(models_handler))
        .route("/actors", post(create_actor_handler))
        .route("/actors/{id}", get(get_actor_handler))
        .route("/actors/{id}/chats", get(list_actor_chats_handler))
        .route("/chats", post(create_chat_handler))
        .route("/chats/{id}", get(get_chat_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize, Deserialize)]
struct ModelDiscoveryResponse {
    providers: Vec<ProviderModels>,
}

#[derive(Deserialize)]
struct CreateActorRequest {
    name: String,
    persona: String,
}

#[derive(Serialize, Deserialize)]
struct ActorDto {
    id: String,
    name: String,
    persona: String,
    created_at: String,
}

impl From<Actor> for ActorDto {
    fn from(actor: Actor) -> Self {
        Self {
            id: actor.id,
            name: actor.name,
            persona: actor.persona,
            created_at: actor.created_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
struct CreateChatRequest {
    actor_id: String,
    title: String,
}

#[derive(Serialize, Deserialize)]
struct ChatSummaryDto {
    id: String,
    actor_id: String,
    title: String,
    message_count: usize,
    updated_at: String,
}

#[derive(Serialize, Deserialize)]
struct ChatDetailResponse {
    id: String,
    actor_id: String,
    title: String,
    summary: String,
    messages: Vec<MessageDto>,
}

#[derive(Serialize, Deserialize)]
struct MessageDto {
    id: String,
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    assets: Vec<Asset>,
    created_at: String,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.clone(),
            role: match m.role {
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
            },
            content: m.content.clone(),
            model: m.model.clone(),
            assets: m.assets.clone(),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

fn chat_summary(chat: &ChatState) -> ChatSummaryDto {
    ChatSummaryDto {
        id: chat.id.to_string(),
        actor_id: chat.actor_id.clone(),
        title: chat.title.clone(),
        message_count: chat.history.len(),
        updated_at: chat.updated_at.to_rfc3339(),
    }
}

// ── Error mapping ─────────────────────────────────────────────────────────

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: Error) -> ApiError {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        // Zero backends is an operational outage; a bad override is the
        // caller's mistake.
        Error::ProviderConfiguration(message) => {
            if message.contains("no providers") {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_REQUEST
            }
        }
        Error::Provider(_) => StatusCode::BAD_GATEWAY,
        Error::Store(_) | Error::Serialization(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn store_error(err: switchboard_core::error::StoreError) -> ApiError {
    error_response(Error::Store(err))
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /v1/chat` — one blocking chat turn.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    info!(actor_id = %request.actor_id, chat_id = %request.chat_id, "v1/chat request");

    state
        .orchestrator
        .handle(request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// `POST /v1/chat/stream` — one chat turn as an SSE stream of typed frames.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(request): Json<TurnRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!(actor_id = %request.actor_id, chat_id = %request.chat_id, "v1/chat/stream request");

    let rx = state
        .orchestrator
        .handle_stream(request)
        .await
        .map_err(error_response)?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream))
}

/// `GET /v1/models` — live model lists, queried fresh per request.
/// Providers that fail to respond report an empty list rather than failing
/// the whole request.
async fn models_handler(State(state): State<SharedState>) -> Json<ModelDiscoveryResponse> {
    Json(ModelDiscoveryResponse {
        providers: state.registry.available_models().await,
    })
}

/// `POST /v1/actors` — create an actor.
async fn create_actor_handler(
    State(state): State<SharedState>,
    Json(request): Json<CreateActorRequest>,
) -> Result<(StatusCode, Json<ActorDto>), ApiError> {
    if request.name.trim().is_empty() || request.persona.trim().is_empty() {
        return Err(error_response(Error::Validation(
            "name and persona are required".into(),
        )));
    }

    let actor = Actor::new(request.name, request.persona);
    let dto = ActorDto::from(actor.clone());
    state.store.put_actor(actor).await.map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// `GET /v1/actors/{id}` — fetch an actor.
async fn get_actor_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ActorDto>, ApiError> {
    let actor = state
        .store
        .get_actor(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_response(Error::NotFound(format!("actor '{id}'"))))?;

    Ok(Json(actor.into()))
}

/// `GET /v1/actors/{id}/chats` — list an actor's chats, newest first.
async fn list_actor_chats_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatSummaryDto>>, ApiError> {
    if state
        .store
        .get_actor(&id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(error_response(Error::NotFound(format!("actor '{id}'"))));
    }

    let chats = state.store.list_chats(&id).await.map_err(store_error)?;
    Ok(Json(chats.iter().map(chat_summary).collect()))
}

/// `POST /v1/chats` — create a chat for an actor.
async fn create_chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatSummaryDto>), ApiError> {
    if request.actor_id.trim().is_empty() || request.title.trim().is_empty() {
        return Err(error_response(Error::Validation(
            "actor_id and title are required".into(),
        )));
    }

    if state
        .store
        .get_actor(&request.actor_id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(error_response(Error::NotFound(format!(
            "actor '{}'",
            request.actor_id
        ))));
    }

    let chat = ChatState::new(request.actor_id, request.title);
    let dto = chat_summary(&chat);
    state.store.put_chat(chat).await.map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// `GET /v1/chats/{id}` — fetch a chat with its full history.
async fn get_chat_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ChatDetailResponse>, ApiError> {
    let chat = state
        .store
        .get_chat(&ChatId::from(&id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_response(Error::NotFound(format!("chat '{id}'"))))?;

    Ok(Json(ChatDetailResponse {
        id: chat.id.to_string(),
        actor_id: chat.actor_id.clone(),
        title: chat.title.clone(),
        summary: chat.summary.clone(),
        messages: chat.history.iter().map(MessageDto::from).collect(),
    }))
}
