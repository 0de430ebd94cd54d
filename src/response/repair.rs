//! Schema-repair cascade
//!
//! An ordered list of parse strategies. Every strategy is total and returns
//! an optional result; the first success wins. The last one always succeeds,
//! so [`repair`] never fails on any input.

use super::literal;
use super::schema::LlmSeoResponse;
use crate::metrics::RAG_METRICS;
use std::fmt;
use tracing::{debug, warn};

/// Longest summary kept when falling back to raw model text, in characters
pub const FALLBACK_SUMMARY_CHARS: usize = 2000;

/// Summary used when the model returned nothing usable at all
pub const EMPTY_COMPLETION_SUMMARY: &str =
    "The language model returned an empty response, so no AI explanation is available for this page.";

/// Which strategy produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    /// Raw text parsed as-is
    Strict,
    /// Parsed after fence stripping and brace extraction
    Extracted,
    /// Parsed as a Python-style literal
    Literal,
    /// Raw text wrapped as a summary
    Fallback,
}

impl RepairStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStage::Strict => "strict",
            RepairStage::Extracted => "extracted",
            RepairStage::Literal => "literal",
            RepairStage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion text plus its extracted JSON candidate
struct Candidate<'a> {
    raw: &'a str,
    extracted: String,
}

type Strategy = fn(&Candidate<'_>) -> Option<LlmSeoResponse>;

const STRATEGIES: &[(RepairStage, Strategy)] = &[
    (RepairStage::Strict, strict),
    (RepairStage::Extracted, extracted),
    (RepairStage::Literal, literal_parse),
];

/// Run the cascade over a completion
pub fn repair(raw: &str) -> (LlmSeoResponse, RepairStage) {
    let candidate = Candidate {
        raw,
        extracted: extract_json_block(raw),
    };

    let (response, stage) = STRATEGIES
        .iter()
        .find_map(|(stage, strategy)| strategy(&candidate).map(|response| (response, *stage)))
        .unwrap_or_else(|| (fallback(&candidate), RepairStage::Fallback));

    match stage {
        RepairStage::Strict => debug!("Model output parsed strictly"),
        RepairStage::Fallback => {
            warn!("Failed to parse model JSON response, falling back to raw text")
        }
        other => debug!("Model output repaired at stage '{}'", other),
    }
    RAG_METRICS.record_repair_stage(stage.as_str());

    (response, stage)
}

fn strict(candidate: &Candidate<'_>) -> Option<LlmSeoResponse> {
    LlmSeoResponse::from_json_str(candidate.raw)
}

fn extracted(candidate: &Candidate<'_>) -> Option<LlmSeoResponse> {
    LlmSeoResponse::from_json_str(&candidate.extracted)
}

fn literal_parse(candidate: &Candidate<'_>) -> Option<LlmSeoResponse> {
    match literal::parse(&candidate.extracted) {
        Ok(value) => LlmSeoResponse::from_value(value),
        Err(e) => {
            debug!("Literal parse failed: {}", e);
            None
        }
    }
}

/// Prefers the extracted text and falls back to the raw completion when
/// extraction left nothing. Only a completion with no text besides fence
/// markers gets the fixed sentence.
fn fallback(candidate: &Candidate<'_>) -> LlmSeoResponse {
    let text = if candidate.extracted.is_empty() {
        candidate.raw.trim()
    } else {
        candidate.extracted.as_str()
    };
    if text.trim_matches(|c: char| c == '`' || c.is_whitespace()).is_empty() {
        return LlmSeoResponse::summary_only(EMPTY_COMPLETION_SUMMARY);
    }
    let summary: String = text.chars().take(FALLBACK_SUMMARY_CHARS).collect();
    LlmSeoResponse::summary_only(summary)
}

/// Strip a surrounding code fence, then keep the span from the first `{`
/// to the last `}` when there is one
pub fn extract_json_block(text: &str) -> String {
    let stripped = strip_fence(text.trim());

    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
        if start < end {
            return stripped[start..=end].trim().to_string();
        }
    }
    stripped.to_string()
}

/// Removes an opening ```` ```lang ```` and a closing ```` ``` ````, whether
/// they sit on their own lines or share a line with the content
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);

    let tag_len = rest
        .find(|c: char| !is_fence_tag_char(c))
        .unwrap_or(rest.len());
    let after_tag = &rest[tag_len..];
    let body = if after_tag.is_empty() || after_tag.starts_with(char::is_whitespace) {
        after_tag
    } else {
        rest
    };
    body.trim()
}

fn is_fence_tag_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '+' | '-')
}
