//! Google Gemini provider adapter.
//!
//! Talks to the Generative Language API (`generateContent`). This is the
//! only adapter family allowed to serve image-generation requests; inline
//! image parts in the response surface as data-URL assets on the reply.

use async_trait::async_trait;
use serde::Deserialize;
use switchboard_core::error::ProviderError;
use switchboard_core::message::{Asset, AssetKind, Role};
use switchboard_core::provider::*;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A Google Gemini adapter.
pub struct GoogleProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a new Gemini adapter.
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Override the API base URL (used by tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert an assembled turn into the Gemini request body.
    ///
    /// Gemini has no system role in `contents`; the persona + summary go
    /// into `system_instruction`, and history alternates user/model parts.
    fn request_body(request: &GenerateRequest) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = request
            .history
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    },
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();

        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{ "text": request.user_message }],
        }));

        serde_json::json!({
            "system_instruction": { "parts": [{ "text": request.system_instruction() }] },
            "contents": contents,
            "generationConfig": { "temperature": request.temperature },
        })
    }

    /// Flatten a candidate's parts into reply text plus decoded assets.
    fn extract_reply(candidate: &ApiCandidate) -> (String, Vec<Asset>) {
        let mut text_parts: Vec<&str> = Vec::new();
        let mut assets: Vec<Asset> = Vec::new();

        let Some(content) = &candidate.content else {
            return (String::new(), assets);
        };

        for part in &content.parts {
            if let Some(text) = &part.text {
                text_parts.push(text);
            }
            if let Some(inline) = &part.inline_data {
                assets.push(Asset {
                    kind: AssetKind::Image,
                    url: format!("data:{};base64,{}", inline.mime_type, inline.data),
                });
            }
        }

        (text_parts.join("\n").trim().to_string(), assets)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::Google
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let response = match self.client.get(&url).send().await {
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

        let body: ApiModelList = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(provider = %self.name, error = %e, "Unparseable model list, reporting empty");
                return Vec::new();
            }
        };

        body.models
            .into_iter()
            .map(|m| {
                m.name
                    .strip_prefix("models/")
                    .map(String::from)
                    .unwrap_or(m.name)
            })
            .collect()
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            429 => {
                return Err(ProviderError::RateLimited {
                    retry_after_secs: 5,
                });
            }
            401 | 403 => {
                return Err(ProviderError::AuthenticationFailed(
                    "Invalid API key or insufficient permissions".into(),
                ));
            }
            404 => return Err(ProviderError::ModelNotFound(request.model.clone())),
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Provider returned error");
                return Err(ProviderError::ApiError {
                    model: request.model.clone(),
                    status_code: status,
                    message: error_body,
                });
            }
        }

        let api_response: ApiGenerateResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                model: request.model.clone(),
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let candidate = api_response.candidates.first().ok_or_else(|| {
            ProviderError::ApiError {
                model: request.model.clone(),
                status_code: 200,
                message: "No candidates in response".into(),
            }
        })?;

        let (text, assets) = Self::extract_reply(candidate);

        let usage = api_response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(GenerateResponse {
            text,
            model: request.model,
            provider: self.name.clone(),
            assets,
            usage,
        })
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiModelList {
    #[serde(default)]
    models: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData")]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
struct ApiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u32,
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::message::{ChatId, Message};

    fn test_request() -> GenerateRequest {
        GenerateRequest {
            model: "gemini-1.5-pro".into(),
            persona: "You are a planner.".into(),
            summary: "The user is building a shed.".into(),
            history: vec![
                Message::user(ChatId::from("c1"), "How big should it be?"),
                Message::assistant(ChatId::from("c1"), "3x4 meters.", "gemini-1.5-pro"),
            ],
            user_message: "Draw it".into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    #[test]
    fn request_body_maps_roles() {
        let body = GoogleProvider::request_body(&test_request());

        let system = body["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(system.contains("You are a planner."));
        assert!(system.contains("building a shed"));

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "Draw it");
    }

    #[test]
    fn parse_text_candidate() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Here is a plan."}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5, "totalTokenCount": 17}
        }"#;
        let parsed: ApiGenerateResponse = serde_json::from_str(raw).unwrap();
        let (text, assets) = GoogleProvider::extract_reply(&parsed.candidates[0]);
        assert_eq!(text, "Here is a plan.");
        assert!(assets.is_empty());
        assert_eq!(parsed.usage_metadata.unwrap().total_token_count, 17);
    }

    #[test]
    fn inline_image_becomes_asset() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [
                    {"text": "Here you go:"},
                    {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
                ]}}
            ]
        }"#;
        let parsed: ApiGenerateResponse = serde_json::from_str(raw).unwrap();
        let (text, assets) = GoogleProvider::extract_reply(&parsed.candidates[0]);

        assert_eq!(text, "Here you go:");
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].kind, AssetKind::Image);
        assert_eq!(assets[0].url, "data:image/png;base64,QUJD");
    }

    #[test]
    fn empty_candidate_yields_empty_reply() {
        let candidate = ApiCandidate { content: None };
        let (text, assets) = GoogleProvider::extract_reply(&candidate);
        assert!(text.is_empty());
        assert!(assets.is_empty());
    }

    #[test]
    fn family_is_google() {
        let provider = GoogleProvider::new("google", "key");
        assert_eq!(provider.family(), ProviderFamily::Google);
        assert_eq!(provider.name(), "google");
    }
}
