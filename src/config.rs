//! Runtime configuration for the RAG pipeline
//!
//! [`EnvDefaults`] holds process-wide defaults read from the environment.
//! [`RagConfig`] is the per-request snapshot: it is resolved once from the
//! defaults plus [`ConfigOverrides`] and threaded through every call, so
//! nothing re-reads the environment while a request is in flight.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Lower bound for retrieved passages per request
pub const MIN_PASSAGES: usize = 1;
/// Upper bound for retrieved passages per request
pub const MAX_PASSAGES: usize = 16;

/// Configuration errors. These are detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{credential} is not set ({env_var}); cannot use the selected provider")]
    MissingCredential {
        credential: &'static str,
        env_var: &'static str,
    },

    #[error("Unknown chat provider '{0}' (expected openai, ollama or gemini)")]
    UnknownChatProvider(String),

    #[error("Unknown embedding backend '{0}' (expected openai, local or ollama)")]
    UnknownEmbeddingBackend(String),

    #[error("Embedding backend '{backend}' is not compiled in (enable the `{feature}` feature)")]
    BackendUnavailable {
        backend: &'static str,
        feature: &'static str,
    },

    #[error("Unknown vector index transport '{0}' (expected rest or grpc)")]
    UnknownTransport(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Chat-completion backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    OpenAi,
    Ollama,
    Gemini,
}

impl ChatProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => "openai",
            ChatProvider::Ollama => "ollama",
            ChatProvider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ChatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ChatProvider::OpenAi),
            "ollama" => Ok(ChatProvider::Ollama),
            "gemini" => Ok(ChatProvider::Gemini),
            other => Err(ConfigError::UnknownChatProvider(other.to_string())),
        }
    }
}

/// Embedding backend used for retrieval queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Managed embedding API
    OpenAi,
    /// Locally hosted sentence-embedding model
    Local,
    /// Embedding endpoint of a local Ollama daemon
    Ollama,
}

impl EmbeddingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingBackend::OpenAi => "openai",
            EmbeddingBackend::Local => "local",
            EmbeddingBackend::Ollama => "ollama",
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(EmbeddingBackend::OpenAi),
            "local" => Ok(EmbeddingBackend::Local),
            "ollama" => Ok(EmbeddingBackend::Ollama),
            other => Err(ConfigError::UnknownEmbeddingBackend(other.to_string())),
        }
    }
}

/// Wire protocol used to reach the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexTransport {
    Rest,
    Grpc,
}

impl FromStr for IndexTransport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rest" | "http" => Ok(IndexTransport::Rest),
            "grpc" => Ok(IndexTransport::Grpc),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

/// Process-wide defaults, one field per environment variable
/// (lowercased, e.g. `OPENAI_MODEL` -> `openai_model`)
#[derive(Debug, Clone, Deserialize)]
pub struct EnvDefaults {
    #[serde(default)]
    pub openai_api_key: Option<SecretString>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_embedding_model")]
    pub openai_embedding_model: String,

    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,

    #[serde(default = "default_local_llm_model")]
    pub local_llm_model: String,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    #[serde(default = "default_ollama_embed_model")]
    pub ollama_embed_model: String,

    #[serde(default)]
    pub gemini_api_key: Option<SecretString>,

    #[serde(default = "default_gemini_api_base")]
    pub gemini_api_base: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: String,

    #[serde(default = "default_local_embed_model")]
    pub local_embed_model: String,

    #[serde(default)]
    pub qdrant_url: Option<String>,

    #[serde(default)]
    pub qdrant_api_key: Option<SecretString>,

    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,

    #[serde(default = "default_qdrant_transport")]
    pub qdrant_transport: String,

    /// Value of the `type` payload field that marks knowledge documents
    #[serde(default = "default_knowledge_type")]
    pub rag_knowledge_type: String,

    #[serde(default = "default_max_passages")]
    pub rag_max_passages: i64,

    /// Anything other than `false` enables retrieval
    #[serde(default = "default_use_rag")]
    pub use_rag: String,

    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_qdrant_timeout")]
    pub qdrant_timeout_secs: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_local_llm_model() -> String {
    "llama3.1".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_embed_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_embedding_backend() -> String {
    "openai".to_string()
}

fn default_local_embed_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_qdrant_collection() -> String {
    "seo_knowledge".to_string()
}

fn default_qdrant_transport() -> String {
    "rest".to_string()
}

fn default_knowledge_type() -> String {
    "seo_guide".to_string()
}

fn default_max_passages() -> i64 {
    6
}

fn default_use_rag() -> String {
    "true".to_string()
}

fn default_provider_timeout() -> u64 {
    60
}

fn default_qdrant_timeout() -> u64 {
    10
}

impl Default for EnvDefaults {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            openai_model: default_openai_model(),
            openai_embedding_model: default_openai_embedding_model(),
            llm_provider: default_llm_provider(),
            local_llm_model: default_local_llm_model(),
            ollama_base_url: default_ollama_base_url(),
            ollama_embed_model: default_ollama_embed_model(),
            gemini_api_key: None,
            gemini_api_base: default_gemini_api_base(),
            gemini_model: default_gemini_model(),
            embedding_backend: default_embedding_backend(),
            local_embed_model: default_local_embed_model(),
            qdrant_url: None,
            qdrant_api_key: None,
            qdrant_collection: default_qdrant_collection(),
            qdrant_transport: default_qdrant_transport(),
            rag_knowledge_type: default_knowledge_type(),
            rag_max_passages: default_max_passages(),
            use_rag: default_use_rag(),
            provider_timeout_secs: default_provider_timeout(),
            qdrant_timeout_secs: default_qdrant_timeout(),
        }
    }
}

impl EnvDefaults {
    /// Load defaults from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(config::Environment::default())
    }

    /// Load defaults from any `config` source; keys are the lowercased
    /// environment variable names
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Ok(defaults)
    }

    fn rag_enabled(&self) -> bool {
        self.use_rag.trim().to_lowercase() != "false"
    }
}

/// Per-request overrides. `None` leaves the environment default in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub embedding_backend: Option<String>,
    #[serde(default)]
    pub use_rag: Option<bool>,
    #[serde(default)]
    pub max_passages: Option<i64>,
}

/// Provider credentials
#[derive(Clone, Default)]
pub struct Credentials {
    openai_api_key: Option<SecretString>,
    gemini_api_key: Option<SecretString>,
}

impl Credentials {
    pub fn openai_api_key(&self) -> Option<&SecretString> {
        self.openai_api_key.as_ref()
    }

    pub fn gemini_api_key(&self) -> Option<&SecretString> {
        self.gemini_api_key.as_ref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Base URLs of the provider APIs
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub openai_base_url: String,
    pub ollama_base_url: String,
    pub gemini_api_base: String,
}

/// Vector index connection settings
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub url: String,
    pub api_key: Option<SecretString>,
    pub collection: String,
    pub transport: IndexTransport,
    pub timeout: Duration,
}

/// Immutable per-request configuration snapshot
#[derive(Debug, Clone)]
pub struct RagConfig {
    chat_provider: ChatProvider,
    chat_model: String,
    embedding_backend: EmbeddingBackend,
    embedding_model: String,
    index: Option<IndexConfig>,
    knowledge_type: String,
    max_passages: usize,
    rag_enabled: bool,
    credentials: Credentials,
    endpoints: Endpoints,
    provider_timeout: Duration,
}

impl RagConfig {
    /// Overlay `overrides` on `defaults` and validate the result
    pub fn resolve(
        defaults: &EnvDefaults,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let chat_provider: ChatProvider = overrides
            .llm_provider
            .as_deref()
            .unwrap_or(&defaults.llm_provider)
            .parse()?;
        let embedding_backend: EmbeddingBackend = overrides
            .embedding_backend
            .as_deref()
            .unwrap_or(&defaults.embedding_backend)
            .parse()?;

        let chat_model = match chat_provider {
            ChatProvider::OpenAi => defaults.openai_model.clone(),
            ChatProvider::Ollama => defaults.local_llm_model.clone(),
            ChatProvider::Gemini => defaults.gemini_model.clone(),
        };
        let embedding_model = match embedding_backend {
            EmbeddingBackend::OpenAi => defaults.openai_embedding_model.clone(),
            EmbeddingBackend::Local => defaults.local_embed_model.clone(),
            EmbeddingBackend::Ollama => defaults.ollama_embed_model.clone(),
        };

        let index = match non_empty(defaults.qdrant_url.as_deref()) {
            Some(url) => Some(IndexConfig {
                url: url.trim_end_matches('/').to_string(),
                api_key: non_empty_secret(defaults.qdrant_api_key.as_ref()),
                collection: defaults.qdrant_collection.clone(),
                transport: defaults.qdrant_transport.parse()?,
                timeout: Duration::from_secs(defaults.qdrant_timeout_secs),
            }),
            None => None,
        };

        let config = Self {
            chat_provider,
            chat_model,
            embedding_backend,
            embedding_model,
            index,
            knowledge_type: defaults.rag_knowledge_type.clone(),
            max_passages: clamp_passages(
                overrides.max_passages.unwrap_or(defaults.rag_max_passages),
            ),
            rag_enabled: overrides.use_rag.unwrap_or_else(|| defaults.rag_enabled()),
            credentials: Credentials {
                openai_api_key: non_empty_secret(defaults.openai_api_key.as_ref()),
                gemini_api_key: non_empty_secret(defaults.gemini_api_key.as_ref()),
            },
            endpoints: Endpoints {
                openai_base_url: defaults.openai_base_url.trim_end_matches('/').to_string(),
                ollama_base_url: defaults.ollama_base_url.trim_end_matches('/').to_string(),
                gemini_api_base: defaults.gemini_api_base.trim_end_matches('/').to_string(),
            },
            provider_timeout: Duration::from_secs(defaults.provider_timeout_secs),
        };

        config.check_credentials()?;
        Ok(config)
    }

    fn check_credentials(&self) -> Result<(), ConfigError> {
        let openai_missing = ConfigError::MissingCredential {
            credential: "OpenAI API key",
            env_var: "OPENAI_API_KEY",
        };

        match self.chat_provider {
            ChatProvider::OpenAi if self.credentials.openai_api_key.is_none() => {
                return Err(openai_missing);
            }
            ChatProvider::Gemini if self.credentials.gemini_api_key.is_none() => {
                return Err(ConfigError::MissingCredential {
                    credential: "Gemini API key",
                    env_var: "GEMINI_API_KEY",
                });
            }
            _ => {}
        }

        if self.retrieval_active()
            && self.embedding_backend == EmbeddingBackend::OpenAi
            && self.credentials.openai_api_key.is_none()
        {
            return Err(openai_missing);
        }

        if self.retrieval_active()
            && self.embedding_backend == EmbeddingBackend::Local
            && !cfg!(feature = "local-embeddings")
        {
            return Err(ConfigError::BackendUnavailable {
                backend: "local",
                feature: "local-embeddings",
            });
        }

        Ok(())
    }

    /// Retrieval runs only when RAG is enabled and an index is configured
    pub fn retrieval_active(&self) -> bool {
        self.rag_enabled && self.index.is_some()
    }

    pub fn chat_provider(&self) -> ChatProvider {
        self.chat_provider
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embedding_backend(&self) -> EmbeddingBackend {
        self.embedding_backend
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn index(&self) -> Option<&IndexConfig> {
        self.index.as_ref()
    }

    pub fn knowledge_type(&self) -> &str {
        &self.knowledge_type
    }

    pub fn max_passages(&self) -> usize {
        self.max_passages
    }

    pub fn rag_enabled(&self) -> bool {
        self.rag_enabled
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }
}

fn clamp_passages(requested: i64) -> usize {
    let clamped = requested.clamp(MIN_PASSAGES as i64, MAX_PASSAGES as i64);
    if clamped != requested {
        warn!(
            "max_passages {} outside [{}, {}], using {}",
            requested, MIN_PASSAGES, MAX_PASSAGES, clamped
        );
    }
    clamped as usize
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty_secret(value: Option<&SecretString>) -> Option<SecretString> {
    value
        .filter(|s| !s.expose_secret().trim().is_empty())
        .cloned()
}
