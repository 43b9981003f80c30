//! End-to-end pipeline scenarios against in-memory fakes
//!
//! Covers the seed cases: strong single-category hit with a known user,
//! multi-category dispatch, low-confidence fallback (enabled and disabled),
//! stage timeout, cold users, and determinism.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use podwise_config::Settings;
use podwise_core::{
    Category, ChunkFilter, ChunkHit, Embedder, Episode, EpisodeStore, Error, InteractionAction,
    InteractionRow, Query, ResponseSource, VectorIndex, WebSearchHit, WebSearchProvider,
    WebSearchResponse, DEFAULT_APOLOGY,
};
use podwise_llm::{GenerationResult, LlmBackend, LlmError, LlmPool, Message};
use podwise_pipeline::{PipelineRunner, RunnerParts};
use podwise_recommender::{CfModel, InteractionSnapshot, RecommenderHandle};
use podwise_tags::{Vocabulary, VocabularyHandle};

const VOCAB_YAML: &str = r#"
tags:
  - name: investing
    category: business
    synonyms: ["投資", "理財"]
  - name: english
    category: education
    synonyms: ["英文", "商業英文"]
"#;

const CANNED_ANSWER: &str = "根據節目內容，投資理財需要先建立預算觀念，接著學習資產配置與風險管理，\
商業英文的節目則建議從情境對話開始，每天持續練習聽力與口說才能進步。";

/// Axis 0 = investing, axis 1 = english, axis 2 = everything else
struct TopicEmbedder;

fn topic_vector(text: &str) -> Vec<f32> {
    let mut v = [0.0f32; 3];
    if text.contains("投資") || text.contains("理財") || text.contains("investing") {
        v[0] = 1.0;
    }
    if text.contains("英文") || text.contains("english") {
        v[1] = 1.0;
    }
    if v == [0.0; 3] {
        v[2] = 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        Ok(topic_vector(text))
    }

    fn dim(&self) -> usize {
        3
    }
}

struct CorpusIndex {
    chunks: Vec<(ChunkHit, Vec<f32>)>,
}

impl CorpusIndex {
    fn seeded() -> Self {
        let chunk = |chunk_id: &str,
                     episode_id: &str,
                     podcast_id: &str,
                     category: Category,
                     tags: &[&str],
                     text: &str| {
            (
                ChunkHit {
                    chunk_id: chunk_id.into(),
                    episode_id: episode_id.into(),
                    podcast_id: podcast_id.into(),
                    podcast_name: format!("podcast {}", podcast_id),
                    chunk_index: 1,
                    text: text.into(),
                    score: 0.0,
                    tags: tags.iter().map(|s| s.to_string()).collect(),
                    category,
                    language: "zh".into(),
                    published_ts: None,
                },
                topic_vector(text),
            )
        };

        Self {
            chunks: vec![
                chunk(
                    "a2",
                    "E2",
                    "P2",
                    Category::Business,
                    &["investing"],
                    "投資理財的進階策略是資產配置。",
                ),
                chunk(
                    "b1",
                    "E1",
                    "P1",
                    Category::Business,
                    &["investing"],
                    "投資理財的第一步是建立預算。",
                ),
                chunk(
                    "m1",
                    "E3",
                    "P3",
                    Category::Business,
                    &["investing", "english"],
                    "商業英文會議中常討論投資議題。",
                ),
                chunk(
                    "m2",
                    "E4",
                    "P4",
                    Category::Education,
                    &["investing", "english"],
                    "學商業英文也能順便認識投資詞彙。",
                ),
            ],
        }
    }
}

#[async_trait]
impl VectorIndex for CorpusIndex {
    async fn search(
        &self,
        vector: &[f32],
        filter: &ChunkFilter,
        k: usize,
    ) -> Result<Vec<ChunkHit>, Error> {
        let mut hits: Vec<ChunkHit> = self
            .chunks
            .iter()
            .filter(|(hit, _)| filter.category.map_or(true, |c| hit.category == c))
            .map(|(hit, chunk_vector)| {
                let mut hit = hit.clone();
                hit.score = vector
                    .iter()
                    .zip(chunk_vector)
                    .map(|(a, b)| a * b)
                    .sum::<f32>()
                    .clamp(0.0, 1.0);
                hit
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn neighbours(
        &self,
        episode_id: &str,
        chunk_index: u32,
        radius: u32,
    ) -> Result<Vec<ChunkHit>, Error> {
        Ok(self
            .chunks
            .iter()
            .map(|(hit, _)| hit.clone())
            .filter(|hit| {
                hit.episode_id == episode_id
                    && hit.chunk_index.abs_diff(chunk_index) <= radius
            })
            .collect())
    }
}

struct FixtureEpisodes;

#[async_trait]
impl EpisodeStore for FixtureEpisodes {
    async fn get_episodes_by_ids(&self, ids: &[String]) -> Result<Vec<Episode>, Error> {
        Ok(ids
            .iter()
            .map(|id| Episode {
                episode_id: id.clone(),
                podcast_id: format!("P-{}", id),
                title: format!("episode {}", id),
                description: String::new(),
                podcast_name: format!("podcast for {}", id),
                audio_uri: format!("https://cdn.example.com/{}.mp3", id),
                image_uri: format!("https://cdn.example.com/{}.jpg", id),
                rss_id: String::new(),
                category: Category::Business,
            })
            .collect())
    }

    async fn episode_ids_in_category(&self, _category: Category) -> Result<Vec<String>, Error> {
        Ok(vec!["E1".into(), "E2".into()])
    }
}

struct CannedLlm;

#[async_trait]
impl LlmBackend for CannedLlm {
    async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
        Ok(GenerationResult {
            text: CANNED_ANSWER.to_string(),
            tokens: 80,
            total_time_ms: 5,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "canned"
    }

    fn backend_name(&self) -> &str {
        "canned"
    }
}

struct DeadLlm;

#[async_trait]
impl LlmBackend for DeadLlm {
    async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
        Err(LlmError::Network("connection refused".into()))
    }

    async fn is_available(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "dead"
    }

    fn backend_name(&self) -> &str {
        "dead"
    }
}

struct ConfidentWeb;

#[async_trait]
impl WebSearchProvider for ConfidentWeb {
    async fn search(&self, query: &str, _max_results: usize, _lang: &str) -> WebSearchResponse {
        WebSearchResponse {
            results: vec![WebSearchHit {
                title: "web result".into(),
                url: "https://example.com".into(),
                snippet: format!("web evidence about {}", query),
                confidence: 0.9,
            }],
            summary: format!("網路搜尋摘要：{}", query),
            confidence: 0.9,
        }
    }
}

fn interactions() -> Vec<InteractionRow> {
    let row = |user: &str, episode: &str| InteractionRow {
        user_id: user.into(),
        episode_id: episode.into(),
        action: InteractionAction::Like,
        timestamp: Utc::now(),
    };
    vec![
        row("u1", "E1"),
        row("u1", "E2"),
        row("u2", "E1"),
        row("u2", "E2"),
    ]
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.recommender.min_interactions = 2;
    settings
}

fn runner_with(settings: Settings, llm: Box<dyn LlmBackend>) -> PipelineRunner {
    let snapshot = InteractionSnapshot::from_rows(
        interactions(),
        settings.recommender.cf_halflife_days,
        Utc::now(),
    );
    let recommender = Arc::new(RecommenderHandle::new(CfModel::new(
        snapshot,
        settings.recommender.k_cf,
        settings.recommender.min_interactions,
    )));

    let parts = RunnerParts {
        vocabulary: Arc::new(VocabularyHandle::new(
            Vocabulary::from_yaml(VOCAB_YAML).unwrap(),
        )),
        embedder: Arc::new(TopicEmbedder),
        index: Arc::new(CorpusIndex::seeded()),
        episodes: Arc::new(FixtureEpisodes),
        recommender,
        llm: Arc::new(LlmPool::from_backends(
            vec![llm],
            Duration::from_secs(2),
            settings.llm.min_answer_chars,
        )),
        websearch: Arc::new(ConfidentWeb),
    };

    PipelineRunner::new(settings, parts)
}

fn runner() -> PipelineRunner {
    runner_with(settings(), Box::new(CannedLlm))
}

#[tokio::test]
async fn strong_business_hit_with_known_user() {
    let report = runner()
        .run(Query::new("t1", "我想學習投資理財").with_user("u1"))
        .await
        .unwrap();

    let response = report.response;
    assert_eq!(response.source, ResponseSource::Rag);
    assert!(response.confidence >= 0.7);
    assert_eq!(response.recommendations[0].episode_id, "E2");
    assert!(response.recommendations.len() <= 3);

    let classify = report.trace.stage("classify").unwrap();
    assert!(classify.note.as_deref().unwrap().contains("primary=business"));
    let expert = report.trace.stage("expert:business").unwrap();
    let confidence: f32 = expert
        .note
        .as_deref()
        .unwrap()
        .trim_start_matches("confidence ")
        .parse()
        .unwrap();
    assert!(confidence >= 0.7);
}

#[tokio::test]
async fn multi_category_query_runs_both_experts() {
    let report = runner()
        .run(Query::new("t2", "商業英文和投資"))
        .await
        .unwrap();

    let classify = report.trace.stage("classify").unwrap();
    assert!(classify.note.as_deref().unwrap().contains("multi=true"));

    let business = report.trace.stage("expert:business").unwrap();
    let education = report.trace.stage("expert:education").unwrap();
    assert!(business.output_size >= 1);
    assert!(education.output_size >= 1);

    let response = report.response;
    assert_eq!(response.source, ResponseSource::Rag);
    let ids: Vec<&str> = response
        .recommendations
        .iter()
        .map(|e| e.episode_id.as_str())
        .collect();
    assert!(ids.contains(&"E3"));
    assert!(ids.contains(&"E4"));
}

#[tokio::test]
async fn obscure_query_falls_back_to_web() {
    let report = runner()
        .run(Query::new("t3", "冷門的量子色動力學史"))
        .await
        .unwrap();

    let response = report.response;
    assert_eq!(response.source, ResponseSource::WebFallback);
    assert!(response.recommendations.is_empty());
    assert!(response.confidence >= 0.7);
    assert!(report.trace.stage("websearch").is_some());
}

#[tokio::test]
async fn fallback_disabled_yields_default() {
    let mut config = settings();
    config.websearch.enabled = false;
    let report = runner_with(config, Box::new(CannedLlm))
        .run(Query::new("t4", "冷門的量子色動力學史"))
        .await
        .unwrap();

    let response = report.response;
    assert_eq!(response.source, ResponseSource::Default);
    assert_eq!(response.confidence, 0.0);
    assert_eq!(response.answer_text, DEFAULT_APOLOGY);
    assert!(response.recommendations.is_empty());
}

#[tokio::test]
async fn reranker_timeout_still_answers() {
    let mut config = settings();
    config.pipeline.stage_budgets_ms.rerank = 0;
    let report = runner_with(config, Box::new(CannedLlm))
        .run(Query::new("t5", "我想學習投資理財"))
        .await
        .unwrap();

    let rerank = report
        .trace
        .entries()
        .iter()
        .find(|e| e.stage.ends_with(":rerank"))
        .unwrap();
    assert!(rerank.timed_out);

    // Pipeline still produced a response from the merged candidates
    assert_eq!(report.response.source, ResponseSource::Rag);
    assert!(!report.response.recommendations.is_empty());
}

#[tokio::test]
async fn cold_user_completes_on_popularity() {
    let report = runner()
        .run(Query::new("t6", "我想學習投資理財").with_user("u_new"))
        .await
        .unwrap();

    let response = report.response;
    assert_eq!(response.source, ResponseSource::Rag);
    assert!(!response.recommendations.is_empty());
    assert!(response.recommendations.len() <= 3);
}

#[tokio::test]
async fn llm_down_with_fallback_disabled_is_unavailable() {
    let mut config = settings();
    config.websearch.enabled = false;
    let result = runner_with(config, Box::new(DeadLlm))
        .run(Query::new("t7", "我想學習投資理財"))
        .await;

    assert!(matches!(
        result,
        Err(Error::BackendUnavailable { .. })
    ));
}

#[tokio::test]
async fn llm_down_with_fallback_enabled_degrades() {
    let report = runner_with(settings(), Box::new(DeadLlm))
        .run(Query::new("t8", "我想學習投資理財"))
        .await
        .unwrap();

    assert_eq!(report.response.source, ResponseSource::WebFallback);
}

#[tokio::test]
async fn identical_inputs_identical_outputs() {
    let runner = runner();
    let run = |id: &'static str| {
        let runner = &runner;
        async move {
            runner
                .run(Query::new(id, "我想學習投資理財").with_user("u1"))
                .await
                .unwrap()
                .response
        }
    };

    let first = run("d1").await;
    let second = run("d2").await;

    assert_eq!(first.answer_text, second.answer_text);
    assert_eq!(first.source, second.source);
    let ids = |r: &podwise_core::Response| {
        r.recommendations
            .iter()
            .map(|e| e.episode_id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn no_duplicate_episodes_in_recommendations() {
    let report = runner()
        .run(Query::new("t9", "商業英文和投資"))
        .await
        .unwrap();

    let mut ids: Vec<String> = report
        .response
        .recommendations
        .iter()
        .map(|e| e.episode_id.clone())
        .collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);
}
