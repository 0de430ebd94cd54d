//! OpenAI-compatible chat completions and embeddings

use super::{ensure_success, http_client, transport_error, ChatRequest, ChatTurn, ProviderError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// OpenAI REST client
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiClient {
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

    /// POST /chat/completions
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.turns,
            temperature: request.temperature,
            response_format: request
                .json_output
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let completion: ChatCompletionResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "response has no choices[0].message.content".to_string(),
                )
            })
    }

    /// POST /embeddings
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);
        debug!("Requesting OpenAI embedding: model={}, chars={}", model, text.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&serde_json::json!({ "model": model, "input": text }))
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let embeddings: EmbeddingResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        embeddings
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response has no data[0].embedding".to_string())
            })
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> OpenAiClient {
        OpenAiClient::new(
            &server.url(),
            SecretString::new("sk-test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request(json_output: bool) -> ChatRequest {
        ChatRequest {
            model: "gpt-4.1-mini".to_string(),
            turns: vec![ChatTurn::system("persona"), ChatTurn::user("question")],
            temperature: 0.3,
            json_output,
        }
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4.1-mini",
                "messages": [
                    {"role": "system", "content": "persona"},
                    {"role": "user", "content": "question"}
                ],
                "response_format": {"type": "json_object"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "{\"summary\":\"ok\"}"}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let text = client(&server).chat(&request(true)).await.unwrap();
        assert_eq!(text, "{\"summary\":\"ok\"}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = client(&server).chat(&request(false)).await.unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_missing_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let err = client(&server).chat(&request(false)).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_chat_unreachable() {
        let client = OpenAiClient::new(
            "http://127.0.0.1:9",
            SecretString::new("sk-test".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.chat(&request(false)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unreachable(_) | ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_embed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .match_body(Matcher::PartialJson(
                json!({"model": "text-embedding-3-small", "input": "case"}),
            ))
            .with_status(200)
            .with_body(json!({"data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]}).to_string())
            .create_async()
            .await;

        let vector = client(&server).embed("text-embedding-3-small", "case").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }
}
