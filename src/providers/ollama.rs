//! Ollama daemon client (`/api/chat` and `/api/embeddings`)

use super::{ensure_success, http_client, transport_error, ChatRequest, ChatTurn, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for a local Ollama daemon
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Non-streaming chat completion
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.turns,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let reply: OllamaChatResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        reply
            .message
            .and_then(|message| message.content)
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "Ollama response did not contain a 'message.content' string".to_string(),
                )
            })
    }

    /// Embedding for a single prompt
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        debug!("Requesting Ollama embedding: model={}", model);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "model": model, "prompt": text }))
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let reply: OllamaEmbeddingResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        reply.embedding.ok_or_else(|| {
            ProviderError::MalformedResponse(
                "Ollama embeddings response did not contain an 'embedding' list".to_string(),
            )
        })
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}
