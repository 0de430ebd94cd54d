//! Knowledge retrieval for grounding prompts
//!
//! Retrieval is best-effort. Every failure after configuration resolution
//! (connectivity, embedding, search, response shape) is logged and turned
//! into an empty [`Retrieval`], so the LLM call can still run ungrounded.

pub mod hits;
pub mod index;

pub use hits::{Payload, SearchHit};
pub use index::{
    connect_index, IndexError, QdrantGrpcIndex, QdrantRestIndex, SearchRequest, VectorIndex,
};

use crate::config::RagConfig;
use crate::metrics::RAG_METRICS;
use crate::providers::{Embedder, ProviderError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// A retrieved reference snippet with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePassage {
    pub text: String,
    pub source_url: Option<String>,
    pub topic: Option<String>,
    pub doc_type: Option<String>,
    pub score: Option<f64>,
}

/// Provenance entry reported to the caller as `rag_sources`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSource {
    pub source_url: Option<String>,
    pub topic: Option<String>,
    pub doc_type: Option<String>,
    pub score: Option<f64>,
}

impl RagSource {
    fn from_payload(payload: &Payload, score: Option<f64>) -> Self {
        Self {
            source_url: string_field(payload, "source_url"),
            topic: string_field(payload, "topic"),
            doc_type: string_field(payload, "doc_type"),
            score,
        }
    }

    fn has_provenance(&self) -> bool {
        self.source_url.is_some() || self.topic.is_some() || self.doc_type.is_some()
    }
}

/// Passages and sources from one retrieval call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub passages: Vec<KnowledgePassage>,
    pub sources: Vec<RagSource>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty() && self.sources.is_empty()
    }
}

/// Reasons retrieval degraded to empty results
#[derive(Debug, thiserror::Error)]
enum RetrievalError {
    #[error("vector index client could not be created: {0}")]
    Client(IndexError),

    #[error("vector index connectivity check failed: {0}")]
    Connectivity(IndexError),

    #[error("embedding backend failed: {0}")]
    Embedding(ProviderError),

    #[error("vector search failed: {0}")]
    Search(IndexError),
}

impl RetrievalError {
    fn outcome(&self) -> &'static str {
        match self {
            RetrievalError::Client(_) => "client_failed",
            RetrievalError::Connectivity(_) => "unreachable",
            RetrievalError::Embedding(_) => "embedding_failed",
            RetrievalError::Search(_) => "search_failed",
        }
    }
}

/// Retrieve passages for `query` using the index and embedder named by `config`
pub async fn retrieve(config: &RagConfig, query: &str) -> Retrieval {
    if !config.rag_enabled() {
        info!("RAG disabled; skipping retrieval");
        RAG_METRICS.record_retrieval("skipped");
        return Retrieval::default();
    }

    let Some(index_config) = config.index() else {
        info!("No vector index URL configured; skipping retrieval");
        RAG_METRICS.record_retrieval("skipped");
        return Retrieval::default();
    };

    let index = match connect_index(index_config) {
        Ok(index) => index,
        Err(e) => return degrade(RetrievalError::Client(e)),
    };

    let embedder = match Embedder::from_config(config) {
        Ok(embedder) => embedder,
        Err(e) => return degrade(RetrievalError::Embedding(e)),
    };

    retrieve_from(config, index.as_ref(), &embedder, query).await
}

/// Retrieve using an explicit index and embedder
pub async fn retrieve_from(
    config: &RagConfig,
    index: &dyn VectorIndex,
    embedder: &Embedder,
    query: &str,
) -> Retrieval {
    match try_retrieve(config, index, embedder, query).await {
        Ok(retrieval) => {
            RAG_METRICS.record_retrieval(if retrieval.is_empty() { "empty" } else { "hits" });
            retrieval
        }
        Err(e) => degrade(e),
    }
}

async fn try_retrieve(
    config: &RagConfig,
    index: &dyn VectorIndex,
    embedder: &Embedder,
    query: &str,
) -> Result<Retrieval, RetrievalError> {
    index
        .check_connectivity()
        .await
        .map_err(RetrievalError::Connectivity)?;

    let vector = embedder
        .embed(config.embedding_model(), query)
        .await
        .map_err(RetrievalError::Embedding)?;

    let collection = config
        .index()
        .map(|index| index.collection.as_str())
        .unwrap_or_default();

    let hits = index
        .search(&SearchRequest {
            collection,
            vector,
            doc_type: config.knowledge_type(),
            limit: config.max_passages(),
        })
        .await
        .map_err(RetrievalError::Search)?;

    info!("Retrieved {} hits from '{}'", hits.len(), collection);
    Ok(collect_hits(hits))
}

fn degrade(error: RetrievalError) -> Retrieval {
    warn!("Retrieval skipped: {}", error);
    RAG_METRICS.record_retrieval(error.outcome());
    Retrieval::default()
}

/// Turn raw hits into passages and sources, then deduplicate.
///
/// A hit without a text field still reports its provenance. Passages with
/// identical text are kept once. Sources sharing a `source_url` collapse to
/// the highest-scored one, at the position of the first occurrence.
pub fn collect_hits(hits: Vec<SearchHit>) -> Retrieval {
    let mut passages = Vec::new();
    let mut sources = Vec::new();

    for hit in hits {
        let Some((payload, score)) = hit.into_payload_and_score() else {
            debug!("Skipping search hit with unsupported shape");
            continue;
        };

        let source = RagSource::from_payload(&payload, score);
        debug!(
            "Hit source: {:?}, topic: {:?}, doc_type: {:?}",
            source.source_url, source.topic, source.doc_type
        );

        if let Some(text) =
            string_field(&payload, "text").or_else(|| string_field(&payload, "content"))
        {
            passages.push(KnowledgePassage {
                text,
                source_url: source.source_url.clone(),
                topic: source.topic.clone(),
                doc_type: source.doc_type.clone(),
                score,
            });
        }

        if source.has_provenance() {
            sources.push(source);
        }
    }

    Retrieval {
        passages: dedup_passages(passages),
        sources: dedup_sources(sources),
    }
}

fn dedup_passages(passages: Vec<KnowledgePassage>) -> Vec<KnowledgePassage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|passage| seen.insert(passage.text.clone()))
        .collect()
}

fn dedup_sources(sources: Vec<RagSource>) -> Vec<RagSource> {
    let mut kept: Vec<RagSource> = Vec::with_capacity(sources.len());
    let mut by_url: HashMap<String, usize> = HashMap::new();

    for source in sources {
        let Some(url) = source.source_url.clone() else {
            kept.push(source);
            continue;
        };

        match by_url.get(&url) {
            Some(&idx) => {
                if rank(source.score) > rank(kept[idx].score) {
                    kept[idx] = source;
                }
            }
            None => {
                by_url.insert(url, kept.len());
                kept.push(source);
            }
        }
    }

    kept
}

fn rank(score: Option<f64>) -> f64 {
    score.unwrap_or(f64::NEG_INFINITY)
}

fn string_field(payload: &Payload, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
