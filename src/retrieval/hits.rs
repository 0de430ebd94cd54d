//! Normalization of vector-search hits
//!
//! Search results arrive in several shapes depending on the transport:
//! typed scored points from the gRPC client, point objects or bare payload
//! dicts from the REST API, and lists wrapping either. [`SearchHit`] accepts
//! all of them and reduces each to a `(payload, score)` pair. Anything else
//! is reported as unsupported and skipped by the caller.

use qdrant_client::qdrant::{value::Kind, ScoredPoint, Value as QdrantValue};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Payload fields as plain JSON
pub type Payload = Map<String, Value>;

/// One raw search result
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHit {
    /// Point with a typed score and payload
    Scored { payload: Payload, score: Option<f64> },
    /// Untyped JSON as returned by the REST API
    Raw(Value),
}

impl SearchHit {
    /// Reduce the hit to `(payload, score)`; `None` for unsupported shapes
    pub fn into_payload_and_score(self) -> Option<(Payload, Option<f64>)> {
        match self {
            SearchHit::Scored { payload, score } => Some((payload, score)),
            SearchHit::Raw(value) => from_json(value),
        }
    }
}

impl From<ScoredPoint> for SearchHit {
    fn from(point: ScoredPoint) -> Self {
        SearchHit::Scored {
            payload: payload_to_json(point.payload),
            score: Some(f64::from(point.score)),
        }
    }
}

fn from_json(value: Value) -> Option<(Payload, Option<f64>)> {
    match value {
        Value::Object(map) => from_object(map),
        // A list wraps the hit; use its first object element
        Value::Array(items) => items.into_iter().find_map(|item| match item {
            Value::Object(map) => from_object(map),
            _ => None,
        }),
        _ => None,
    }
}

fn from_object(mut map: Payload) -> Option<(Payload, Option<f64>)> {
    let score = map.get("score").and_then(Value::as_f64);
    match map.remove("payload") {
        Some(Value::Object(payload)) if !payload.is_empty() => Some((payload, score)),
        // No usable payload: the object itself is the payload
        Some(Value::Object(_)) | Some(Value::Null) | None => Some((map, score)),
        Some(_) => None,
    }
}

/// Convert a gRPC payload into JSON
pub fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Payload {
    payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect()
}

fn value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(st)) => Value::Object(payload_to_json(st.fields)),
    }
}
