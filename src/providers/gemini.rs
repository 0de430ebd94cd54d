//! Google Gemini `generateContent` client

use super::{ensure_success, http_client, transport_error, ChatRequest, ChatTurn, ProviderError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini REST client. The conversation is flattened into one user prompt.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: flatten_turns(&request.turns),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let reply: GenerateContentResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let candidate = reply.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse("Gemini response contained no candidates".to_string())
        })?;

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "Gemini response did not contain any text parts".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// `ROLE: content` blocks separated by blank lines; empty turns are dropped
fn flatten_turns(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .filter(|turn| !turn.content.is_empty())
        .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
