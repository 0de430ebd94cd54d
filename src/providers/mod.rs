//! Chat-completion and embedding provider adapters
//!
//! Both capabilities are closed sets dispatched through an enum. Adding a
//! backend means a new adapter module plus one arm in each `match` below;
//! retrieval, prompt assembly and validation never see the difference.

pub mod gemini;
pub mod local;
pub mod ollama;
pub mod openai;

pub use gemini::GeminiClient;
pub use local::LocalEmbedder;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::config::{ChatProvider, EmbeddingBackend, RagConfig};
use crate::metrics::RAG_METRICS;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Speaker of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A single non-streaming completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub turns: Vec<ChatTurn>,
    pub temperature: f32,
    /// Ask the backend for a JSON object when it supports a JSON output mode
    pub json_output: bool,
}

/// Chat-completion backend selected by the configuration
pub enum ChatClient {
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
    Gemini(GeminiClient),
}

impl ChatClient {
    /// Build the client for the configured chat provider
    pub fn from_config(config: &RagConfig) -> Result<Self, ProviderError> {
        let timeout = config.provider_timeout();
        let endpoints = config.endpoints();

        let client = match config.chat_provider() {
            ChatProvider::OpenAi => {
                let key = config
                    .credentials()
                    .openai_api_key()
                    .ok_or(ProviderError::MissingCredential("OPENAI_API_KEY"))?;
                let client = OpenAiClient::new(&endpoints.openai_base_url, key.clone(), timeout)?;
                ChatClient::OpenAi(client)
            }
            ChatProvider::Ollama => {
                ChatClient::Ollama(OllamaClient::new(&endpoints.ollama_base_url, timeout)?)
            }
            ChatProvider::Gemini => {
                let key = config
                    .credentials()
                    .gemini_api_key()
                    .ok_or(ProviderError::MissingCredential("GEMINI_API_KEY"))?;
                let client = GeminiClient::new(&endpoints.gemini_api_base, key.clone(), timeout)?;
                ChatClient::Gemini(client)
            }
        };

        Ok(client)
    }

    pub fn provider(&self) -> ChatProvider {
        match self {
            ChatClient::OpenAi(_) => ChatProvider::OpenAi,
            ChatClient::Ollama(_) => ChatProvider::Ollama,
            ChatClient::Gemini(_) => ChatProvider::Gemini,
        }
    }

    /// Run the completion and return the generated text
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let start = Instant::now();
        debug!(
            "Chat request: provider={}, model={}, turns={}",
            self.provider(),
            request.model,
            request.turns.len()
        );

        let result = match self {
            ChatClient::OpenAi(client) => client.chat(request).await,
            ChatClient::Ollama(client) => client.chat(request).await,
            ChatClient::Gemini(client) => client.chat(request).await,
        };

        RAG_METRICS.record_chat(
            self.provider().as_str(),
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        if let Err(e) = &result {
            warn!("Chat completion via {} failed: {}", self.provider(), e);
        }

        result
    }
}

/// Embedding backend selected by the configuration
pub enum Embedder {
    OpenAi(OpenAiClient),
    Local(LocalEmbedder),
    Ollama(OllamaClient),
}

impl Embedder {
    /// Build the embedder for the configured backend
    pub fn from_config(config: &RagConfig) -> Result<Self, ProviderError> {
        let timeout = config.provider_timeout();
        let endpoints = config.endpoints();

        let embedder = match config.embedding_backend() {
            EmbeddingBackend::OpenAi => {
                let key = config
                    .credentials()
                    .openai_api_key()
                    .ok_or(ProviderError::MissingCredential("OPENAI_API_KEY"))?;
                let client = OpenAiClient::new(&endpoints.openai_base_url, key.clone(), timeout)?;
                Embedder::OpenAi(client)
            }
            EmbeddingBackend::Local => Embedder::Local(LocalEmbedder::new(timeout)),
            EmbeddingBackend::Ollama => {
                Embedder::Ollama(OllamaClient::new(&endpoints.ollama_base_url, timeout)?)
            }
        };

        Ok(embedder)
    }

    pub fn backend(&self) -> EmbeddingBackend {
        match self {
            Embedder::OpenAi(_) => EmbeddingBackend::OpenAi,
            Embedder::Local(_) => EmbeddingBackend::Local,
            Embedder::Ollama(_) => EmbeddingBackend::Ollama,
        }
    }

    /// Embed `text` with `model`
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let result = match self {
            Embedder::OpenAi(client) => client.embed(model, text).await,
            Embedder::Local(embedder) => embedder.embed(model, text).await,
            Embedder::Ollama(client) => client.embed(model, text).await,
        };

        let result = result.and_then(|vector| {
            if vector.is_empty() {
                Err(ProviderError::MalformedResponse(
                    "embedding vector is empty".to_string(),
                ))
            } else {
                Ok(vector)
            }
        });

        RAG_METRICS.record_embedding(self.backend().as_str(), result.is_ok());
        result
    }
}

/// Build a reqwest client with a per-call timeout
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Unreachable(format!("failed to build HTTP client: {}", e)))
}

/// Translate a transport failure into the provider taxonomy
pub(crate) fn transport_error(url: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(format!("{}: {}", url, e))
    } else {
        ProviderError::Unreachable(format!("failed to reach {}: {}", url, e))
    }
}

/// Reject non-success responses, keeping the body for diagnostics
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Scale a vector to unit length; zero vectors are returned unchanged
pub(crate) fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
    vector
}
