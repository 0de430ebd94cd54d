//! Retrieval-augmented LLM explanations for on-page SEO analysis
//!
//! [`RagPipeline`] takes the JSON document produced by a heuristic page
//! analyzer and either explains it as a [`response::AnalysisResult`] or
//! answers follow-up chat turns about it. Reference passages come from a
//! Qdrant collection; completions come from OpenAI, Ollama or Gemini.

pub mod analysis;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod response;
pub mod retrieval;

pub use analysis::CaseSummary;
pub use crate::config::{ConfigOverrides, EnvDefaults, RagConfig};
pub use error::{RagError, Result};
pub use pipeline::RagPipeline;
pub use providers::{ChatTurn, Role};
pub use response::{AnalysisResult, LlmSeoResponse, PriorityIssue};
pub use retrieval::{KnowledgePassage, RagSource};
