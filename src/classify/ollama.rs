use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::semantic::{FallbackRequest, SemanticProvider};
use super::FallbackError;
use crate::config::PipelineConfig;

/// Ollama HTTP provider for the semantic fallback.
///
/// The request timeout is enforced by `SemanticClassifier`; this client only
/// bounds connection setup.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Result<Self, FallbackError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(2))
            .build()
            .map_err(|e| FallbackError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, FallbackError> {
        Self::new(&config.ollama_url, &config.intent_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl SemanticProvider for OllamaProvider {
    async fn complete(&self, request: &FallbackRequest<'_>) -> Result<String, FallbackError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: request.utterance,
            system: request.instruction,
            stream: false,
            format: "json",
            options: GenerateOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    FallbackError::Connection(self.base_url.clone())
                } else {
                    FallbackError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FallbackError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| FallbackError::Transport(e.to_string()))?;

        Ok(parsed.response)
    }
}
