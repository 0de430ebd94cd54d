//! RAG orchestration: structured analysis and grounded chat
//!
//! Each call resolves its own [`RagConfig`] snapshot from the process
//! defaults and the caller's overrides, then runs strictly in sequence:
//! retrieval, prompt assembly, chat dispatch, and (for Analyze) repair.

use crate::analysis::CaseSummary;
use crate::config::{ConfigOverrides, EnvDefaults, RagConfig};
use crate::error::{RagError, Result};
use crate::prompt::{self, ANALYZE_PERSONA};
use crate::providers::{ChatClient, ChatRequest, ChatTurn, ProviderError};
use crate::response::{repair, AnalysisResult};
use crate::retrieval;
use serde_json::Value;
use tracing::{debug, info};

/// Sampling temperature for structured analysis
pub const ANALYZE_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for chat replies
pub const CHAT_TEMPERATURE: f32 = 0.4;

/// Entry point for the two public operations
#[derive(Debug, Clone)]
pub struct RagPipeline {
    defaults: EnvDefaults,
}

impl RagPipeline {
    pub fn new(defaults: EnvDefaults) -> Self {
        Self { defaults }
    }

    /// Pipeline using defaults from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(EnvDefaults::from_env()?))
    }

    /// Produce a structured, grounded explanation of an analysis document
    pub async fn analyze(
        &self,
        document: &Value,
        overrides: &ConfigOverrides,
    ) -> Result<AnalysisResult> {
        let config = RagConfig::resolve(&self.defaults, overrides)?;
        let client = chat_client(&config)?;
        info!(
            "Analyze: provider={}, model={}, rag={}",
            config.chat_provider(),
            config.chat_model(),
            config.retrieval_active()
        );

        let summary = CaseSummary::from_document(document);
        let retrieval = retrieval::retrieve(&config, &summary.to_string()).await;
        let prompt = prompt::build_analysis_prompt(document, &summary, &retrieval.passages);
        debug!(
            "Prompt assembled: {} chars, {} passages",
            prompt.len(),
            retrieval.passages.len()
        );

        let request = ChatRequest {
            model: config.chat_model().to_string(),
            turns: vec![ChatTurn::system(ANALYZE_PERSONA), ChatTurn::user(prompt)],
            temperature: ANALYZE_TEMPERATURE,
            json_output: true,
        };
        let content = dispatch(&client, &request).await?;

        let (response, stage) = repair(&content);
        info!("Analyze complete: repair stage={}, sources={}", stage, retrieval.sources.len());

        Ok(AnalysisResult {
            response,
            rag_sources: retrieval.sources,
        })
    }

    /// Answer the latest turn of a conversation about an analysis document
    pub async fn chat(
        &self,
        document: &Value,
        turns: &[ChatTurn],
        overrides: &ConfigOverrides,
    ) -> Result<String> {
        if turns.is_empty() {
            return Err(RagError::EmptyConversation);
        }

        let config = RagConfig::resolve(&self.defaults, overrides)?;
        let client = chat_client(&config)?;
        info!(
            "Chat: provider={}, model={}, turns={}",
            config.chat_provider(),
            config.chat_model(),
            turns.len()
        );

        let summary = CaseSummary::from_document(document);
        let query = prompt::chat_retrieval_query(&summary, turns);
        let retrieval = retrieval::retrieve(&config, &query).await;

        let context = prompt::build_chat_context(&summary, &retrieval.passages);
        let request = ChatRequest {
            model: config.chat_model().to_string(),
            turns: prompt::build_conversation(&context, turns),
            temperature: CHAT_TEMPERATURE,
            json_output: false,
        };

        dispatch(&client, &request).await
    }
}

fn chat_client(config: &RagConfig) -> Result<ChatClient> {
    ChatClient::from_config(config).map_err(|source| chat_error(config, source))
}

async fn dispatch(client: &ChatClient, request: &ChatRequest) -> Result<String> {
    client.complete(request).await.map_err(|source| RagError::Chat {
        provider: client.provider(),
        source,
    })
}

fn chat_error(config: &RagConfig, source: ProviderError) -> RagError {
    RagError::Chat {
        provider: config.chat_provider(),
        source,
    }
}
