//! In-process sentence-embedding model
//!
//! Backed by `fastembed` when the `local-embeddings` feature is enabled.
//! Without it, every call reports [`ProviderError::Unsupported`].

use super::ProviderError;
use std::time::Duration;

/// Local embedding model runner
pub struct LocalEmbedder {
    #[cfg_attr(not(feature = "local-embeddings"), allow(dead_code))]
    timeout: Duration,
}

impl LocalEmbedder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Embed `text`; the returned vector has unit length
    #[cfg(feature = "local-embeddings")]
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        use fastembed::{InitOptions, TextEmbedding};
        use tracing::debug;

        let kind = model_kind(model)?;
        let text = text.to_string();
        debug!("Running local embedding model {}", model);

        // Model loading and inference are CPU bound
        let task = tokio::task::spawn_blocking(move || {
            let mut embedder = TextEmbedding::try_new(
                InitOptions::new(kind).with_show_download_progress(false),
            )
            .map_err(|e| ProviderError::Unreachable(format!("failed to load local model: {}", e)))?;

            embedder
                .embed(vec![text], None)
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?
                .pop()
                .ok_or_else(|| {
                    ProviderError::MalformedResponse("model returned no embedding".to_string())
                })
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(ProviderError::Timeout(format!(
                "local embedding exceeded {:?}",
                self.timeout
            ))),
            Ok(Err(join_error)) => Err(ProviderError::Unreachable(join_error.to_string())),
            Ok(Ok(result)) => result.map(super::normalize),
        }
    }

    #[cfg(not(feature = "local-embeddings"))]
    pub async fn embed(&self, model: &str, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "local embedding model '{}' requires the `local-embeddings` feature",
            model
        )))
    }
}

#[cfg(feature = "local-embeddings")]
fn model_kind(model: &str) -> Result<fastembed::EmbeddingModel, ProviderError> {
    use fastembed::EmbeddingModel;

    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();
    match name.as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        _ => Err(ProviderError::Unsupported(format!(
            "unknown local embedding model '{}'",
            model
        ))),
    }
}
