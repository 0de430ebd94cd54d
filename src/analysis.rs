//! Case summary: a compact, labeled view of the upstream analysis document
//!
//! The analysis document itself is opaque to this crate. Only the fields
//! listed in [`CASE_FACTS`] are read; everything else is passed through to
//! the prompt untouched.

use serde_json::Value;
use std::fmt;

/// Labeled facts, each read from a JSON pointer into the analysis document
const CASE_FACTS: &[(&str, &str)] = &[
    ("Final URL", "/final_url"),
    ("HTTP status", "/http/status_code"),
    ("Response time (s)", "/http/response_time_seconds"),
    ("HTML bytes", "/http/content_length_bytes"),
    ("Title length", "/html/title/length"),
    ("Meta description length", "/html/meta_description/length"),
    ("H1 count", "/html/h1/count"),
    ("Word count", "/html/word_count"),
    ("Images total", "/html/images/total"),
    ("Images without alt", "/html/images/without_alt_count"),
    ("Internal links", "/links/internal_count"),
    ("External links", "/links/external_count"),
    ("Viewport present", "/html/viewport_present"),
    ("Structured data present", "/html/structured_data_present"),
    ("Open Graph present", "/html/open_graph_present"),
    ("Twitter Card present", "/html/twitter_card_present"),
];

/// Deterministic flattening of an analysis document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSummary {
    facts: Vec<(&'static str, String)>,
    total_recommendations: usize,
}

impl CaseSummary {
    /// Build the summary. Pure: identical documents give identical summaries.
    pub fn from_document(document: &Value) -> Self {
        let facts = CASE_FACTS
            .iter()
            .map(|(label, pointer)| (*label, render_scalar(document.pointer(pointer))))
            .collect();

        let total_recommendations = document
            .get("recommendations_by_category")
            .and_then(Value::as_object)
            .map(|categories| {
                categories
                    .values()
                    .filter_map(Value::as_array)
                    .map(Vec::len)
                    .sum()
            })
            .unwrap_or(0);

        Self {
            facts,
            total_recommendations,
        }
    }

    pub fn facts(&self) -> &[(&'static str, String)] {
        &self.facts
    }

    /// Number of heuristic recommendations across all categories
    pub fn total_recommendations(&self) -> usize {
        self.total_recommendations
    }
}

impl fmt::Display for CaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in &self.facts {
            writeln!(f, "{}: {}", label, value)?;
        }
        write!(f, "Total heuristic recommendations: {}", self.total_recommendations)
    }
}

fn render_scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => "empty".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // Arrays and objects are not scalar facts; report their size instead
        Some(Value::Array(items)) => format!("{} items", items.len()),
        Some(Value::Object(fields)) => format!("{} fields", fields.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "final_url": "https://example.com/",
            "http": {
                "status_code": 200,
                "response_time_seconds": 0.42,
                "content_length_bytes": 51234
            },
            "html": {
                "title": {"text": "Example", "length": 7},
                "meta_description": {"text": null, "length": 0},
                "h1": {"count": 2},
                "word_count": 830,
                "images": {"total": 12, "without_alt_count": 5},
                "viewport_present": true,
                "structured_data_present": false,
                "open_graph_present": true,
                "twitter_card_present": false
            },
            "links": {"internal_count": 40, "external_count": 3},
            "recommendations_by_category": {
                "title": [{"message": "Lengthen the title"}],
                "images": [{"message": "Add alt text"}, {"message": "Compress images"}],
                "links": []
            }
        })
    }

    #[test]
    fn test_summary_facts() {
        let summary = CaseSummary::from_document(&sample_document());
        let text = summary.to_string();

        assert!(text.contains("Final URL: https://example.com/"));
        assert!(text.contains("HTTP status: 200"));
        assert!(text.contains("Response time (s): 0.42"));
        assert!(text.contains("Images without alt: 5"));
        assert!(text.contains("Viewport present: true"));
        assert!(text.contains("Structured data present: false"));
        assert!(text.ends_with("Total heuristic recommendations: 3"));
        assert_eq!(summary.total_recommendations(), 3);
        assert_eq!(summary.facts().len(), CASE_FACTS.len());
    }

    #[test]
    fn test_summary_is_deterministic() {
        let document = sample_document();
        let first = CaseSummary::from_document(&document).to_string();
        let second = CaseSummary::from_document(&document.clone()).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_sections_render_unknown() {
        let summary = CaseSummary::from_document(&json!({"http": null, "html": {"title": ""}}));
        let text = summary.to_string();
        assert!(text.contains("HTTP status: unknown"));
        assert!(text.contains("Title length: unknown"));
        assert_eq!(summary.total_recommendations(), 0);
    }

    #[test]
    fn test_non_object_document() {
        let summary = CaseSummary::from_document(&json!("not an analysis"));
        assert!(summary.facts().iter().all(|(_, v)| v == "unknown"));
    }
}
