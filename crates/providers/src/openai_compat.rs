//! OpenAI-compatible provider adapter.
//!
//! Works with: OpenAI, Grok (x.ai), and any backend exposing an
//! OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Live model listing (fail-soft on transport errors)

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use switchboard_core::error::ProviderError;
use switchboard_core::message::Role;
use switchboard_core::provider::*;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM adapter.
///
/// This handles the majority of backends since most expose an
/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    family: ProviderFamily,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible adapter.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            family: ProviderFamily::OpenAi,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI adapter (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create a Grok adapter (convenience constructor).
    pub fn grok(api_key: impl Into<String>) -> Self {
        Self::new("grok", "https://api.x.ai/v1", api_key)
    }

    /// Convert an assembled turn into the OpenAI message list:
    /// system instruction, recent history, then the current user message.
    fn to_api_messages(request: &GenerateRequest) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);

        messages.push(ApiMessage {
            role: "system".into(),
            content: Some(request.system_instruction()),
        });

        for m in &request.history {
            messages.push(ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: Some(m.content.clone()),
            });
        }

        messages.push(ApiMessage {
            role: "user".into(),
            content: Some(request.user_message.clone()),
        });

        messages
    }

    fn request_body(request: &GenerateRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    fn classify_status(model: &str, status: u16, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            404 => ProviderError::ModelNotFound(model.to_string()),
            _ => ProviderError::ApiError {
                model: model.to_string(),
                status_code: status,
                message: body,
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ProviderFamily {
        self.family
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/models", self.base_url);
        let response = match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(provider = %self.name, error = %e, "Model listing failed, reporting empty");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(
                provider = %self.name,
                status = response.status().as_u16(),
                "Model listing returned an error status, reporting empty"
            );
            return Vec::new();
        }

        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(provider = %self.name, error = %e, "Unparseable model list, reporting empty");
                return Vec::new();
            }
        };

        body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(Self::classify_status(&request.model, status, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                model: request.model.clone(),
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    model: request.model.clone(),
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(GenerateResponse {
            text: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            provider: self.name.clone(),
            assets: Vec::new(),
            usage,
        })
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(Self::classify_status(&request.model, status, error_body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and parse chunks in a spawned task.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    // "[DONE]" signals end of stream
                    if data == "[DONE]" {
                        let _ = tx
                            .send(Ok(StreamChunk {
                                text: None,
                                assets: Vec::new(),
                                done: true,
                                usage: None,
                            }))
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            if let Some(choice) = stream_resp.choices.first() {
                                if let Some(content) = &choice.delta.content {
                                    if !content.is_empty()
                                        && tx
                                            .send(Ok(StreamChunk {
                                                text: Some(content.clone()),
                                                assets: Vec::new(),
                                                done: false,
                                                usage: None,
                                            }))
                                            .await
                                            .is_err()
                                    {
                                        return; // receiver dropped
                                    }
                                }
                            }

                            // Usage arrives in the final chunk (stream_options)
                            if let Some(usage) = stream_resp.usage {
                                let _ = tx
                                    .send(Ok(StreamChunk {
                                        text: None,
                                        assets: Vec::new(),
                                        done: true,
                                        usage: Some(Usage {
                                            prompt_tokens: usage.prompt_tokens,
                                            completion_tokens: usage.completion_tokens,
                                            total_tokens: usage.total_tokens,
                                        }),
                                    }))
                                    .await;
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE] — send final chunk
            let _ = tx
                .send(Ok(StreamChunk {
                    text: None,
                    assets: Vec::new(),
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::message::{ChatId, Message};

    fn test_request() -> GenerateRequest {
        GenerateRequest {
            model: "gpt-4o".into(),
            persona: "You are concise.".into(),
            summary: "No summary available yet.".into(),
            history: vec![
                Message::user(ChatId::from("c1"), "What is Rust?"),
                Message::assistant(ChatId::from("c1"), "A systems language.", "gpt-4o"),
            ],
            user_message: "Tell me more".into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.family(), ProviderFamily::OpenAi);
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn grok_constructor() {
        let provider = OpenAiCompatProvider::grok("xai-test");
        assert_eq!(provider.name(), "grok");
        assert!(provider.base_url.contains("api.x.ai"));
    }

    #[test]
    fn message_conversion_layers_in_order() {
        let api_messages = OpenAiCompatProvider::to_api_messages(&test_request());

        // system, two history turns, current user message
        assert_eq!(api_messages.len(), 4);
        assert_eq!(api_messages[0].role, "system");
        let system = api_messages[0].content.as_deref().unwrap();
        assert!(system.contains("You are concise."));
        assert!(system.contains("No summary available yet."));
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[2].role, "assistant");
        assert_eq!(api_messages[3].role, "user");
        assert_eq!(api_messages[3].content.as_deref(), Some("Tell me more"));
    }

    #[test]
    fn request_body_stream_flag() {
        let body = OpenAiCompatProvider::request_body(&test_request(), true);
        assert_eq!(body["stream"], serde_json::json!(true));
        assert_eq!(
            body["stream_options"]["include_usage"],
            serde_json::json!(true)
        );

        let body = OpenAiCompatProvider::request_body(&test_request(), false);
        assert_eq!(body["stream"], serde_json::json!(false));
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            OpenAiCompatProvider::classify_status("m", 429, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatProvider::classify_status("m", 401, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiCompatProvider::classify_status("m", 404, String::new()),
            ProviderError::ModelNotFound(_)
        ));
        match OpenAiCompatProvider::classify_status("gpt-4o", 500, "boom".into()) {
            ProviderError::ApiError {
                model,
                status_code,
                message,
            } => {
                assert_eq!(model, "gpt-4o");
                assert_eq!(status_code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected ApiError, got: {other:?}"),
        }
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_stream_usage() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 15);
    }
}
