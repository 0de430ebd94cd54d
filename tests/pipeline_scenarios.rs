//! End-to-end scenarios for the RAG pipeline
//!
//! A single mockito server plays both the Ollama daemon (chat and
//! embeddings) and the Qdrant REST API.

use mockito::{Matcher, Server, ServerGuard};
use seo_rag::config::{ConfigOverrides, EnvDefaults, RagConfig};
use seo_rag::retrieval::{self, Retrieval};
use seo_rag::{ChatTurn, RagError, RagPipeline};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn defaults(server: &ServerGuard, with_index: bool) -> EnvDefaults {
    EnvDefaults {
        llm_provider: "ollama".to_string(),
        embedding_backend: "ollama".to_string(),
        ollama_base_url: server.url(),
        qdrant_url: with_index.then(|| server.url()),
        rag_max_passages: 4,
        ..EnvDefaults::default()
    }
}

fn bare_document() -> Value {
    json!({
        "final_url": "https://bare.example/",
        "http": {"status_code": 200, "response_time_seconds": 0.2},
        "html": {
            "title": {"text": "", "length": 0},
            "meta_description": {"text": "", "length": 0},
            "h1": {"count": 0}
        },
        "recommendations_by_category": {
            "title": ["Add a title"],
            "meta_description": ["Add a meta description"]
        }
    })
}

fn chat_reply(content: &str) -> String {
    json!({"message": {"role": "assistant", "content": content}, "done": true}).to_string()
}

async fn mock_embeddings(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/api/embeddings")
        .with_status(200)
        .with_body(json!({"embedding": [0.3, 0.1, 0.7]}).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn rag_disabled_skips_retrieval_and_still_summarizes() {
    let mut server = Server::new_async().await;
    let collections = server
        .mock("GET", "/collections")
        .expect(0)
        .create_async()
        .await;
    let embeddings = server
        .mock("POST", "/api/embeddings")
        .expect(0)
        .create_async()
        .await;
    let sent = Arc::new(Mutex::new(String::new()));
    let captured = Arc::clone(&sent);
    let chat = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body_from_request(move |request| {
            let body = request.body().map(|b| b.to_vec()).unwrap_or_default();
            *captured.lock().unwrap() = String::from_utf8_lossy(&body).into_owned();
            chat_reply("The page has no title and no meta description.").into_bytes()
        })
        .create_async()
        .await;

    let pipeline = RagPipeline::new(defaults(&server, true));
    let overrides = ConfigOverrides {
        use_rag: Some(false),
        ..Default::default()
    };
    let result = pipeline.analyze(&bare_document(), &overrides).await.unwrap();

    assert_eq!(result.response.summary, "The page has no title and no meta description.");
    assert!(result.rag_sources.is_empty());
    collections.assert_async().await;
    embeddings.assert_async().await;
    chat.assert_async().await;

    let body = sent.lock().unwrap().clone();
    assert!(body.contains("Final URL: https://bare.example/"));
    assert!(!body.contains("REFERENCE_SEO_MATERIAL"));
    assert!(!body.contains("--- SOURCE"));
}

#[tokio::test]
async fn fenced_completion_is_extracted() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(chat_reply("```json\n{\"summary\":\"ok\",\"priority_issues\":[]}\n```"))
        .create_async()
        .await;

    let pipeline = RagPipeline::new(defaults(&server, false));
    let result = pipeline
        .analyze(&bare_document(), &ConfigOverrides::default())
        .await
        .unwrap();

    assert_eq!(result.response.summary, "ok");
    assert!(result.response.priority_issues.is_empty());
}

#[tokio::test]
async fn search_failure_degrades_to_ungrounded_analysis() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/collections")
        .with_status(200)
        .with_body(json!({"result": {"collections": []}, "status": "ok"}).to_string())
        .create_async()
        .await;
    mock_embeddings(&mut server).await;
    let search = server
        .mock("POST", "/collections/seo_knowledge/points/search")
        .with_status(503)
        .with_body("upstream connect error")
        .create_async()
        .await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(chat_reply(
            r#"{"summary": "Ungrounded but fine.", "grade": "Needs improvement"}"#,
        ))
        .create_async()
        .await;

    let pipeline = RagPipeline::new(defaults(&server, true));
    let result = pipeline
        .analyze(&bare_document(), &ConfigOverrides::default())
        .await
        .unwrap();

    assert_eq!(result.response.summary, "Ungrounded but fine.");
    assert_eq!(result.response.grade.as_deref(), Some("Needs improvement"));
    assert!(result.rag_sources.is_empty());
    search.assert_async().await;
}

#[tokio::test]
async fn grounded_analysis_reports_deduplicated_sources() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/collections")
        .with_status(200)
        .with_body(json!({"result": {"collections": [{"name": "seo_knowledge"}]}}).to_string())
        .create_async()
        .await;
    mock_embeddings(&mut server).await;
    server
        .mock("POST", "/collections/seo_knowledge/points/search")
        .match_body(Matcher::PartialJson(json!({
            "limit": 4,
            "filter": {"must": [{"key": "type", "match": {"value": "seo_guide"}}]}
        })))
        .with_status(200)
        .with_body(
            json!({"result": [
                {"id": 1, "score": 0.71, "payload": {
                    "text": "Titles should describe the page in 50-60 characters.",
                    "source_url": "https://guide.example/titles", "topic": "title", "doc_type": "guide"}},
                {"id": 2, "score": 0.93, "payload": {
                    "text": "Put the primary keyword near the start of the title.",
                    "source_url": "https://guide.example/titles", "topic": "title", "doc_type": "guide"}},
                {"id": 3, "score": 0.55, "payload": {
                    "source_url": "https://guide.example/meta", "topic": "meta_description"}}
            ], "status": "ok"})
            .to_string(),
        )
        .create_async()
        .await;
    let chat = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r"\[REFERENCE_SEO_MATERIAL\]".to_string()),
            Matcher::Regex("--- SOURCE 2 ---".to_string()),
        ]))
        .with_status(200)
        .with_body(chat_reply(
            "{'summary': 'Missing title and description.', 'quick_wins': ['Write a title',], 'score': 35}",
        ))
        .create_async()
        .await;

    let pipeline = RagPipeline::new(defaults(&server, true));
    let result = pipeline
        .analyze(&bare_document(), &ConfigOverrides::default())
        .await
        .unwrap();

    assert_eq!(result.response.summary, "Missing title and description.");
    assert_eq!(result.response.score, Some(35));
    assert_eq!(result.rag_sources.len(), 2);
    assert_eq!(result.rag_sources[0].source_url.as_deref(), Some("https://guide.example/titles"));
    assert_eq!(result.rag_sources[0].score, Some(0.93));
    assert_eq!(result.rag_sources[1].topic.as_deref(), Some("meta_description"));
    chat.assert_async().await;

    let serialized = serde_json::to_value(&result).unwrap();
    assert_eq!(serialized["rag_sources"][1]["doc_type"], Value::Null);
    assert_eq!(serialized["quick_wins"], json!(["Write a title"]));
}

#[tokio::test]
async fn unreachable_index_yields_empty_retrieval() {
    let mut server = Server::new_async().await;
    mock_embeddings(&mut server).await;

    let config = RagConfig::resolve(
        &EnvDefaults {
            qdrant_url: Some("http://127.0.0.1:9".to_string()),
            ..defaults(&server, false)
        },
        &ConfigOverrides::default(),
    )
    .unwrap();
    assert!(config.retrieval_active());

    let retrieval = retrieval::retrieve(&config, "Final URL: https://bare.example/").await;
    assert_eq!(retrieval, Retrieval::default());
}

#[tokio::test]
async fn chat_provider_failure_is_a_pipeline_error() {
    let server = Server::new_async().await;
    let url = server.url();
    drop(server);

    let pipeline = RagPipeline::new(EnvDefaults {
        llm_provider: "ollama".to_string(),
        ollama_base_url: url,
        ..EnvDefaults::default()
    });
    let err = pipeline
        .chat(
            &bare_document(),
            &[ChatTurn::user("What should I fix first?")],
            &ConfigOverrides::default(),
        )
        .await
        .unwrap_err();

    assert!(err.is_pipeline_error());
    assert!(matches!(err, RagError::Chat { .. }));
}
