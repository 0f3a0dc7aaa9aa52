//! Model fallback — ordered retry over alternate model IDs.
//!
//! When generation with the requested model fails, automatically retries
//! with each model from the provider's statically configured fallback list,
//! in order. First success wins; if every candidate fails, the caller gets
//! one aggregated error naming every attempted model.

use std::sync::Arc;
use switchboard_core::error::ProviderError;
use switchboard_core::provider::{GenerateRequest, GenerateResponse, ProviderAdapter, StreamChunk};
use tracing::{info, warn};

/// The ordered list of model IDs to attempt: the requested model first,
/// then each configured fallback that isn't a duplicate.
fn candidates(request: &GenerateRequest, fallback_models: &[String]) -> Vec<String> {
    let mut models = vec![request.model.clone()];
    for m in fallback_models {
        if !models.contains(m) {
            models.push(m.clone());
        }
    }
    models
}

/// Generate with the requested model, falling back through
/// `fallback_models` in order on failure.
pub async fn generate_with_fallbacks(
    adapter: &Arc<dyn ProviderAdapter>,
    request: GenerateRequest,
    fallback_models: &[String],
) -> std::result::Result<GenerateResponse, ProviderError> {
    let models = candidates(&request, fallback_models);
    let total = models.len();
    let mut attempted: Vec<String> = Vec::with_capacity(total);
    let mut last_error = String::new();

    for (i, model) in models.into_iter().enumerate() {
        info!(
            provider = adapter.name(),
            model = %model,
            attempt = i + 1,
            total,
            "Generation attempt"
        );

        attempted.push(model.clone());
        match adapter.generate(request.clone().with_model(model.clone())).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(
                    provider = adapter.name(),
                    model = %model,
                    error = %e,
                    "Generation failed, trying next model"
                );
                last_error = e.to_string();
            }
        }
    }

    Err(ProviderError::AllModelsFailed {
        attempted,
        last_error,
    })
}

/// Streaming variant: the first model whose stream opens wins. Failures
/// after the stream has opened are the stream's own business — fallback only
/// covers the initial call.
pub async fn stream_with_fallbacks(
    adapter: &Arc<dyn ProviderAdapter>,
    request: GenerateRequest,
    fallback_models: &[String],
) -> std::result::Result<
    tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
    ProviderError,
> {
    let models = candidates(&request, fallback_models);
    let total = models.len();
    let mut attempted: Vec<String> = Vec::with_capacity(total);
    let mut last_error = String::new();

    for (i, model) in models.into_iter().enumerate() {
        info!(
            provider = adapter.name(),
            model = %model,
            attempt = i + 1,
            total,
            "Generation attempt (streaming)"
        );

        attempted.push(model.clone());
        match adapter
            .generate_stream(request.clone().with_model(model.clone()))
            .await
        {
            Ok(rx) => return Ok(rx),
            Err(e) => {
                warn!(
                    provider = adapter.name(),
                    model = %model,
                    error = %e,
                    "Stream open failed, trying next model"
                );
                last_error = e.to_string();
            }
        }
    }

    Err(ProviderError::AllModelsFailed {
        attempted,
        last_error,
    })
}
