//! Structured LLM result types and their validation rules

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// One prioritized SEO issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityIssue {
    pub category: String,
    pub title: String,
    pub impact: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommended_actions: Vec<String>,
}

/// Structured explanation produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSeoResponse {
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub priority_issues: Vec<PriorityIssue>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub quick_wins: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub long_term_ideas: Vec<String>,
    /// Overall score, 0-100
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<u8>,
    #[serde(default)]
    pub grade: Option<String>,
}

impl LlmSeoResponse {
    /// Minimal result carrying only a summary
    pub fn summary_only(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            priority_issues: Vec::new(),
            quick_wins: Vec::new(),
            long_term_ideas: Vec::new(),
            score: None,
            grade: None,
        }
    }

    /// Strict parse of JSON text
    pub fn from_json_str(text: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                debug!("Strict parse failed: {}", e);
                None
            }
        }
    }

    /// Schema validation of an already parsed structure. Only objects
    /// qualify; serde would otherwise accept a sequence by field position.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            debug!("Schema validation failed: top-level value is not an object");
            return None;
        }
        match serde_json::from_value::<Self>(value) {
            Ok(response) => response.validated(),
            Err(e) => {
                debug!("Schema validation failed: {}", e);
                None
            }
        }
    }

    fn validated(self) -> Option<Self> {
        if self.summary.trim().is_empty() {
            debug!("Rejecting response with blank summary");
            return None;
        }
        Some(self)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts integers, floats and numeric strings; rounds and clamps to 0-100.
/// Anything else is treated as absent.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(score_from_value))
}

fn score_from_value(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_response() {
        let response = LlmSeoResponse::from_value(json!({
            "summary": "Solid page with a weak title.",
            "priority_issues": [{
                "category": "title",
                "title": "Title too short",
                "impact": "high",
                "difficulty": "easy",
                "recommended_actions": ["Use 'Example Widgets | Shop'", "Add the brand"]
            }],
            "quick_wins": ["Add alt text"],
            "long_term_ideas": ["Build topical clusters"],
            "score": 64,
            "grade": "Needs improvement"
        }))
        .unwrap();

        assert_eq!(response.priority_issues.len(), 1);
        assert_eq!(response.priority_issues[0].difficulty.as_deref(), Some("easy"));
        assert_eq!(response.score, Some(64));
    }

    #[test]
    fn test_missing_and_null_lists_default_to_empty() {
        let response = LlmSeoResponse::from_value(json!({
            "summary": "ok",
            "priority_issues": null,
            "quick_wins": null
        }))
        .unwrap();
        assert!(response.priority_issues.is_empty());
        assert!(response.quick_wins.is_empty());
        assert!(response.long_term_ideas.is_empty());
        assert_eq!(response.score, None);
        assert_eq!(response.grade, None);
    }

    #[test]
    fn test_score_normalization() {
        for (raw, expected) in [
            (json!(72.6), Some(73)),
            (json!(140), Some(100)),
            (json!(-3), Some(0)),
            (json!("55"), Some(55)),
            (json!("great"), None),
            (json!([1]), None),
            (json!(null), None),
        ] {
            let response =
                LlmSeoResponse::from_value(json!({"summary": "s", "score": raw})).unwrap();
            assert_eq!(response.score, expected);
        }
    }

    #[test]
    fn test_invalid_structures_rejected() {
        assert!(LlmSeoResponse::from_value(json!({"priority_issues": []})).is_none());
        assert!(LlmSeoResponse::from_value(json!({"summary": "   "})).is_none());
        assert!(LlmSeoResponse::from_value(json!({"summary": 5})).is_none());
        assert!(LlmSeoResponse::from_value(json!({
            "summary": "s",
            "priority_issues": [{"category": "title"}]
        }))
        .is_none());
        assert!(LlmSeoResponse::from_value(json!(["summary"])).is_none());
    }

    #[test]
    fn test_strict_parse() {
        assert!(
            LlmSeoResponse::from_json_str(r#"{"summary":"ok","priority_issues":[]}"#).is_some()
        );
        assert!(LlmSeoResponse::from_json_str("```json\n{\"summary\":\"ok\"}\n```").is_none());
        assert!(LlmSeoResponse::from_json_str("").is_none());
        assert!(LlmSeoResponse::from_json_str(r#"["Fix the title"]"#).is_none());
        assert!(LlmSeoResponse::from_json_str(r#"["Fix the title", [], [], [], 80]"#).is_none());
    }
}
