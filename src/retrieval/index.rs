//! Vector index clients (Qdrant over REST or gRPC)

use super::hits::SearchHit;
use crate::config::{IndexConfig, IndexTransport};
use async_trait::async_trait;
use qdrant_client::qdrant::{Condition, Filter, SearchPointsBuilder};
use qdrant_client::Qdrant;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

/// Vector index errors
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Failed to build index client: {0}")]
    Client(String),

    #[error("Index unreachable: {0}")]
    Unreachable(String),

    #[error("Index timeout: {0}")]
    Timeout(String),

    #[error("Index returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unsupported search response shape: {0}")]
    UnsupportedShape(String),
}

/// Similarity search parameters
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub collection: &'a str,
    pub vector: Vec<f32>,
    /// Only documents whose `type` payload field equals this value
    pub doc_type: &'a str,
    pub limit: usize,
}

/// A searchable vector collection
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Cheap request proving the endpoint and credentials work
    async fn check_connectivity(&self) -> Result<(), IndexError>;

    /// Filtered similarity search, best match first
    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>, IndexError>;
}

/// Build the client for the configured transport. No network I/O happens here.
pub fn connect_index(config: &IndexConfig) -> Result<Box<dyn VectorIndex>, IndexError> {
    match config.transport {
        IndexTransport::Rest => Ok(Box::new(QdrantRestIndex::new(config)?)),
        IndexTransport::Grpc => Ok(Box::new(QdrantGrpcIndex::new(config)?)),
    }
}

/// Qdrant HTTP API client
pub struct QdrantRestIndex {
    http: Client,
    url: String,
    api_key: Option<SecretString>,
}

impl QdrantRestIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexError::Client(e.to_string()))?;

        Ok(Self {
            http,
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("api-key", key.expose_secret()),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, IndexError> {
        let response = self.with_auth(req).send().await.map_err(|e| {
            if e.is_timeout() {
                IndexError::Timeout(e.to_string())
            } else {
                IndexError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| IndexError::UnsupportedShape(e.to_string()))
    }
}

#[async_trait]
impl VectorIndex for QdrantRestIndex {
    async fn check_connectivity(&self) -> Result<(), IndexError> {
        let url = format!("{}/collections", self.url);
        self.send(self.http.get(&url)).await.map(|_| ())
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>, IndexError> {
        let url = format!("{}/collections/{}/points/search", self.url, request.collection);
        let body = json!({
            "vector": request.vector,
            "limit": request.limit,
            "with_payload": true,
            "filter": {
                "must": [{"key": "type", "match": {"value": request.doc_type}}]
            }
        });

        let response = self.send(self.http.post(&url).json(&body)).await?;
        rest_hits(response)
    }
}

/// The search endpoint returns `result` as a list of points; the query
/// endpoint wraps the list as `result.points`
fn rest_hits(response: Value) -> Result<Vec<SearchHit>, IndexError> {
    let result = match response {
        Value::Object(mut body) => body.remove("result").unwrap_or(Value::Null),
        other => other,
    };

    let points = match result {
        Value::Array(points) => points,
        Value::Object(mut wrapper) => match wrapper.remove("points") {
            Some(Value::Array(points)) => points,
            _ => {
                return Err(IndexError::UnsupportedShape(
                    "result object has no 'points' list".to_string(),
                ))
            }
        },
        other => {
            return Err(IndexError::UnsupportedShape(format!(
                "unexpected result value: {}",
                other
            )))
        }
    };

    Ok(points.into_iter().map(SearchHit::Raw).collect())
}

/// Qdrant gRPC client
pub struct QdrantGrpcIndex {
    client: Qdrant,
}

impl QdrantGrpcIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(&config.url).timeout(config.timeout);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.expose_secret().clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorIndex for QdrantGrpcIndex {
    async fn check_connectivity(&self) -> Result<(), IndexError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| IndexError::Unreachable(format!("Failed to list collections: {}", e)))?;
        debug!("Qdrant reachable: {} collections", collections.collections.len());
        Ok(())
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>, IndexError> {
        let search = SearchPointsBuilder::new(
            request.collection,
            request.vector.clone(),
            request.limit as u64,
        )
        .filter(Filter::must([Condition::matches(
            "type",
            request.doc_type.to_string(),
        )]))
        .with_payload(true);

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| IndexError::Unreachable(format!("Failed to search points: {}", e)))?;

        Ok(response.result.into_iter().map(SearchHit::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn rest_config(url: String, api_key: Option<&str>) -> IndexConfig {
        IndexConfig {
            url,
            api_key: api_key.map(|k| SecretString::new(k.to_string())),
            collection: "seo_knowledge".to_string(),
            transport: IndexTransport::Rest,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_rest_hits_shapes() {
        let list = rest_hits(json!({"result": [{"score": 1.0, "payload": {}}], "status": "ok"})).unwrap();
        assert_eq!(list.len(), 1);

        let wrapped = rest_hits(json!({"result": {"points": [{"id": 1}, {"id": 2}]}})).unwrap();
        assert_eq!(wrapped.len(), 2);

        assert!(matches!(
            rest_hits(json!({"result": "nope"})),
            Err(IndexError::UnsupportedShape(_))
        ));
        assert!(matches!(
            rest_hits(json!({"result": {"hits": []}})),
            Err(IndexError::UnsupportedShape(_))
        ));
    }

    #[tokio::test]
    async fn test_rest_search_sends_type_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/collections/seo_knowledge/points/search")
            .match_header("api-key", "q-key")
            .match_body(Matcher::PartialJson(json!({
                "limit": 4,
                "with_payload": true,
                "filter": {"must": [{"key": "type", "match": {"value": "seo_guide"}}]}
            })))
            .with_status(200)
            .with_body(
                json!({"result": [{"id": 1, "score": 0.8, "payload": {"text": "t"}}], "status": "ok"})
                    .to_string(),
            )
            .create_async()
            .await;

        let index = QdrantRestIndex::new(&rest_config(server.url(), Some("q-key"))).unwrap();
        let hits = index
            .search(&SearchRequest {
                collection: "seo_knowledge",
                vector: vec![0.1, 0.2],
                doc_type: "seo_guide",
                limit: 4,
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rest_connectivity_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/collections")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let index = QdrantRestIndex::new(&rest_config(server.url(), None)).unwrap();
        let err = index.check_connectivity().await.unwrap_err();
        assert!(matches!(err, IndexError::Status { status: 403, .. }));
    }

    #[test]
    fn test_connect_index_selects_transport() {
        let config = rest_config("http://localhost:6333".to_string(), None);
        assert!(connect_index(&config).is_ok());
    }
}
