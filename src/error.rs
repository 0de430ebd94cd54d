//! Error types for the RAG pipeline
//!
//! Only configuration faults and chat provider faults ever reach the caller.
//! Retrieval and schema faults are absorbed inside the pipeline.

use crate::config::{ChatProvider, ConfigError};
use crate::providers::ProviderError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors surfaced by [`crate::RagPipeline`]
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{provider} chat call failed: {source}")]
    Chat {
        provider: ChatProvider,
        #[source]
        source: ProviderError,
    },

    #[error("no chat messages provided")]
    EmptyConversation,
}

impl RagError {
    /// Every variant belongs to the "RAG pipeline error" category, so the API
    /// layer can keep serving the heuristic result instead of failing hard.
    pub fn is_pipeline_error(&self) -> bool {
        matches!(
            self,
            RagError::Config(_) | RagError::Chat { .. } | RagError::EmptyConversation
        )
    }

    /// True when the fault was detected before any network call was made
    pub fn is_configuration_fault(&self) -> bool {
        matches!(self, RagError::Config(_) | RagError::EmptyConversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = RagError::Config(ConfigError::MissingCredential {
            credential: "OpenAI API key",
            env_var: "OPENAI_API_KEY",
        });
        assert!(err.is_pipeline_error());
        assert!(err.is_configuration_fault());

        let err = RagError::Chat {
            provider: ChatProvider::Ollama,
            source: ProviderError::Unreachable("connection refused".to_string()),
        };
        assert!(err.is_pipeline_error());
        assert!(!err.is_configuration_fault());
        assert_eq!(
            err.to_string(),
            "ollama chat call failed: Provider unreachable: connection refused"
        );
    }
}
