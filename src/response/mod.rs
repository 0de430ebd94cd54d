//! Model output validation and repair

pub mod literal;
pub mod repair;
pub mod schema;

pub use repair::{repair, RepairStage};
pub use schema::{LlmSeoResponse, PriorityIssue};

use crate::retrieval::RagSource;
use serde::{Deserialize, Serialize};

/// Result of the Analyze operation: the structured explanation plus the
/// sources retrieval used to ground it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub response: LlmSeoResponse,
    #[serde(default)]
    pub rag_sources: Vec<RagSource>,
}
