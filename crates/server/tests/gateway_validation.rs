//! Gateway validation and status-code mapping

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use podwise_config::Settings;
use podwise_core::{
    Category, ChunkFilter, ChunkHit, Embedder, Episode, EpisodeStore, Error, VectorIndex,
    WebSearchProvider, WebSearchResponse,
};
use podwise_llm::{GenerationResult, LlmBackend, LlmError, LlmPool, Message};
use podwise_pipeline::{PipelineRunner, RunnerParts};
use podwise_recommender::{CfModel, InteractionSnapshot, RecommenderHandle};
use podwise_server::{create_router, AppState, HealthRegistry};
use podwise_tags::{Vocabulary, VocabularyHandle};

struct UnitEmbedder;

#[async_trait]
impl Embedder for UnitEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
        Ok(vec![1.0, 0.0])
    }

    fn dim(&self) -> usize {
        2
    }
}

struct OneHitIndex;

#[async_trait]
impl VectorIndex for OneHitIndex {
    async fn search(
        &self,
        _vector: &[f32],
        _filter: &ChunkFilter,
        _k: usize,
    ) -> Result<Vec<ChunkHit>, Error> {
        Ok(vec![ChunkHit {
            chunk_id: "c1".into(),
            episode_id: "E1".into(),
            podcast_id: "P1".into(),
            podcast_name: "fixture show".into(),
            chunk_index: 0,
            text: "an episode all about the topic in depth.".into(),
            score: 0.95,
            tags: vec!["topic".into()],
            category: Category::Other,
            language: "en".into(),
            published_ts: None,
        }])
    }

    async fn neighbours(
        &self,
        _episode_id: &str,
        _chunk_index: u32,
        _radius: u32,
    ) -> Result<Vec<ChunkHit>, Error> {
        Ok(Vec::new())
    }
}

struct OneEpisodeStore;

#[async_trait]
impl EpisodeStore for OneEpisodeStore {
    async fn get_episodes_by_ids(&self, ids: &[String]) -> Result<Vec<Episode>, Error> {
        Ok(ids
            .iter()
            .map(|id| Episode {
                episode_id: id.clone(),
                podcast_id: "P1".into(),
                title: "fixture episode".into(),
                description: String::new(),
                podcast_name: "fixture show".into(),
                audio_uri: "https://cdn.example.com/a.mp3".into(),
                image_uri: "https://cdn.example.com/a.jpg".into(),
                rss_id: String::new(),
                category: Category::Other,
            })
            .collect())
    }

    async fn episode_ids_in_category(&self, _category: Category) -> Result<Vec<String>, Error> {
        Ok(vec!["E1".into()])
    }
}

struct WordyLlm;

#[async_trait]
impl LlmBackend for WordyLlm {
    async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
        Ok(GenerationResult {
            text: "The topic is covered across several segments of this episode, with concrete \
                   examples and practical advice for listeners who are just getting started."
                .into(),
            tokens: 40,
            total_time_ms: 2,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "wordy"
    }

    fn backend_name(&self) -> &str {
        "wordy"
    }
}

struct SilentWeb;

#[async_trait]
impl WebSearchProvider for SilentWeb {
    async fn search(&self, _q: &str, _n: usize, _lang: &str) -> WebSearchResponse {
        WebSearchResponse::empty()
    }
}

fn test_state(qps: u32) -> AppState {
    let mut settings = Settings::default();
    settings.server.qps_ceiling_per_client = qps;
    settings.server.max_query_len = 64;

    let vocabulary = Arc::new(VocabularyHandle::new(
        Vocabulary::from_yaml(
            r#"
tags:
  - name: topic
    category: other
"#,
        )
        .unwrap(),
    ));

    let snapshot = InteractionSnapshot::from_rows(Vec::new(), 30.0, chrono::Utc::now());
    let recommender = Arc::new(RecommenderHandle::new(CfModel::new(snapshot, 10, 5)));

    let runner = Arc::new(PipelineRunner::new(
        settings.clone(),
        RunnerParts {
            vocabulary: vocabulary.clone(),
            embedder: Arc::new(UnitEmbedder),
            index: Arc::new(OneHitIndex),
            episodes: Arc::new(OneEpisodeStore),
            recommender: recommender.clone(),
            llm: Arc::new(LlmPool::from_backends(
                vec![Box::new(WordyLlm)],
                Duration::from_secs(2),
                settings.llm.min_answer_chars,
            )),
            websearch: Arc::new(SilentWeb),
        },
    ));

    let health = HealthRegistry::new()
        .register("llm", || Box::pin(async { true }))
        .register("vector_index", || Box::pin(async { true }));

    AppState::new(
        settings,
        runner,
        recommender,
        Arc::new(OneEpisodeStore),
        vocabulary,
        health,
    )
}

fn query_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn empty_text_is_bad_request() {
    let app = create_router(test_state(100));
    let response = app
        .oneshot(query_request(serde_json::json!({ "text": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_text_is_bad_request() {
    let app = create_router(test_state(100));
    let long_text = "x".repeat(65);
    let response = app
        .oneshot(query_request(serde_json::json!({ "text": long_text })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_user_id_is_bad_request() {
    let app = create_router(test_state(100));
    let response = app
        .oneshot(query_request(
            serde_json::json!({ "text": "about topic", "user_id": "bad user!" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn valid_query_returns_answer_shape() {
    let app = create_router(test_state(100));
    let response = app
        .oneshot(query_request(serde_json::json!({ "text": "about topic" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["source"], "rag");
    assert!(body["confidence"].as_f64().unwrap() >= 0.7);
    assert!(!body["trace_id"].as_str().unwrap().is_empty());
    let recommendations = body["recommendations"].as_array().unwrap();
    assert!(!recommendations.is_empty());
    assert_eq!(recommendations[0]["episode_id"], "E1");
    assert!(recommendations[0]["audio_uri"].as_str().is_some());
}

#[tokio::test]
async fn qps_ceiling_maps_to_429() {
    let state = test_state(1);
    let app = create_router(state);

    let first = app
        .clone()
        .oneshot(query_request(
            serde_json::json!({ "text": "about topic", "user_id": "u1" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(query_request(
            serde_json::json!({ "text": "about topic", "user_id": "u1" }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn health_reports_components() {
    let app = create_router(test_state(100));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["llm"], true);
}

#[tokio::test]
async fn direct_recommendations_for_cold_user() {
    // A cold user still gets a well-formed (possibly empty) ranking
    let app = create_router(test_state(100));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/recommendations?user_id=u_new&top_k=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["user_id"], "u_new");
    assert!(body["recommendations"].is_array());
}
