//! HTTP API gateway for Switchboard.
//!
//! Exposes the chat turn endpoint (blocking JSON and SSE streaming), model
//! discovery, and actor/chat management over Axum.

pub mod api;

use std::sync::Arc;
use switchboard_chat::ChatOrchestrator;
use switchboard_config::AppConfig;
use switchboard_core::store::ConversationStore;
use switchboard_providers::ProviderRegistry;
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub registry: Arc<ProviderRegistry>,
    pub store: Arc<dyn ConversationStore>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> axum::Router {
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    axum::Router::new()
        .route("/health", axum::routing::get(api::health_handler))
        .nest("/v1", api::v1_router(state))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the store, provider registry, and orchestrator once and shares
/// them via `Arc`.
pub async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = switchboard_memory::build_store(&config.store).await?;
    let registry = Arc::new(switchboard_providers::build_from_config(&config));

    if registry.is_empty() {
        return Err("no providers configured — set OPENAI_API_KEY, GEMINI_API_KEY, or XAI_API_KEY, or configure providers in the config file".into());
    }

    let orchestrator = Arc::new(ChatOrchestrator::from_config(
        &config,
        store.clone(),
        registry.clone(),
    ));

    let state = Arc::new(GatewayState {
        orchestrator,
        registry,
        store,
    });

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
