//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{endpoints, gate, recommender, retries, retrieval, timeouts};
use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Tag vocabulary configuration
    #[serde(default)]
    pub tags: TagsConfig,

    /// Embedding + vector index configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Collaborative recommender configuration
    #[serde(default)]
    pub recommender: RecommenderConfig,

    /// Episode lookup service
    #[serde(default)]
    pub episodes: EpisodeStoreConfig,

    /// LLM backend pool configuration
    #[serde(default)]
    pub llm: LlmPoolConfig,

    /// Web-search fallback configuration
    #[serde(default)]
    pub websearch: WebSearchConfig,

    /// Pipeline stage budgets, merge sizes, and gate weights
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-client queries-per-second ceiling
    #[serde(default = "default_qps_ceiling")]
    pub qps_ceiling_per_client: u32,

    /// Maximum accepted query length, characters (L_q_max)
    #[serde(default = "default_max_query_len")]
    pub max_query_len: usize,

    /// Overall request budget, ms (T_req)
    #[serde(default = "default_request_budget_ms")]
    pub request_budget_ms: u64,

    #[serde(default)]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}
fn default_qps_ceiling() -> u32 {
    5
}
fn default_max_query_len() -> usize {
    512
}
fn default_request_budget_ms() -> u64 {
    timeouts::REQUEST_BUDGET_MS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            qps_ceiling_per_client: default_qps_ceiling(),
            max_query_len: default_max_query_len(),
            request_budget_ms: default_request_budget_ms(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

/// Tag vocabulary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Path to the vocabulary YAML
    #[serde(default = "default_vocabulary_path")]
    pub vocabulary_path: String,
}

fn default_vocabulary_path() -> String {
    "config/tags.yaml".to_string()
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            vocabulary_path: default_vocabulary_path(),
        }
    }
}

/// Embedding + vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Embedding backend endpoint (Ollama-compatible)
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimension (D); must match the vector index
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Embedding request timeout, ms
    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,

    /// Qdrant endpoint
    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    /// Qdrant collection holding transcript chunks
    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,

    /// Qdrant API key (optional)
    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// HNSW ef search width; pinning it keeps result orderings stable
    #[serde(default = "default_hnsw_ef")]
    pub qdrant_hnsw_ef: Option<u64>,

    /// Semantic vs tag weight in the hybrid score
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    /// Candidates per hybrid search
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Bound on outstanding embedding + index requests
    #[serde(default = "default_pool_max_outstanding")]
    pub pool_max_outstanding: usize,

    /// Wait for a pool slot before failing, ms (T_pool)
    #[serde(default = "default_pool_wait_ms")]
    pub pool_wait_ms: u64,

    /// Retry attempts at the embedding boundary (R)
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,

    /// Initial retry backoff, ms
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_embedding_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.clone()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_embedding_dim() -> usize {
    768
}
fn default_embed_timeout_ms() -> u64 {
    timeouts::EMBED_REQUEST_MS
}
fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.clone()
}
fn default_qdrant_collection() -> String {
    "podcast_chunks".to_string()
}
fn default_hnsw_ef() -> Option<u64> {
    Some(128)
}
fn default_hybrid_alpha() -> f32 {
    retrieval::HYBRID_ALPHA
}
fn default_search_top_k() -> usize {
    retrieval::SEARCH_TOP_K
}
fn default_pool_max_outstanding() -> usize {
    32
}
fn default_pool_wait_ms() -> u64 {
    timeouts::POOL_WAIT_MS
}
fn default_retry_max() -> u32 {
    retries::MAX_ATTEMPTS
}
fn default_retry_backoff_ms() -> u64 {
    retries::INITIAL_BACKOFF_MS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            embed_timeout_ms: default_embed_timeout_ms(),
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_collection: default_qdrant_collection(),
            qdrant_api_key: None,
            qdrant_hnsw_ef: default_hnsw_ef(),
            hybrid_alpha: default_hybrid_alpha(),
            search_top_k: default_search_top_k(),
            pool_max_outstanding: default_pool_max_outstanding(),
            pool_wait_ms: default_pool_wait_ms(),
            retry_max: default_retry_max(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Collaborative recommender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Neighbourhood size (k_cf)
    #[serde(default = "default_k_cf")]
    pub k_cf: usize,

    /// Interactions required before kNN activates for a user
    #[serde(default = "default_min_interactions")]
    pub min_interactions: usize,

    /// Rating age-decay half-life, days
    #[serde(default = "default_cf_halflife_days")]
    pub cf_halflife_days: f32,

    /// Interaction snapshot dump (JSON lines)
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Snapshot refresh poll cadence, seconds
    #[serde(default = "default_refresh_interval_s")]
    pub refresh_interval_s: u64,
}

fn default_k_cf() -> usize {
    recommender::NEIGHBOURS
}
fn default_min_interactions() -> usize {
    recommender::MIN_INTERACTIONS
}
fn default_cf_halflife_days() -> f32 {
    recommender::HALF_LIFE_DAYS
}
fn default_snapshot_path() -> String {
    "data/interactions.jsonl".to_string()
}
fn default_refresh_interval_s() -> u64 {
    300
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            k_cf: default_k_cf(),
            min_interactions: default_min_interactions(),
            cf_halflife_days: default_cf_halflife_days(),
            snapshot_path: default_snapshot_path(),
            refresh_interval_s: default_refresh_interval_s(),
        }
    }
}

/// Episode lookup service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeStoreConfig {
    #[serde(default = "default_episode_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_episode_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_episode_endpoint() -> String {
    "http://localhost:7070".to_string()
}
fn default_episode_timeout_ms() -> u64 {
    3_000
}

impl Default for EpisodeStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_episode_endpoint(),
            timeout_ms: default_episode_timeout_ms(),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Ollama,
    OpenAi,
}

/// One backend in the priority pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    pub name: String,
    pub provider: LlmProviderKind,
    pub endpoint: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Lower value tried first
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    /// Bounded concurrent in-flight requests for this backend
    #[serde(default = "default_llm_max_inflight")]
    pub max_inflight: usize,
}

fn default_llm_max_tokens() -> usize {
    512
}
fn default_llm_temperature() -> f32 {
    0.3
}
fn default_llm_max_inflight() -> usize {
    4
}

/// LLM pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPoolConfig {
    /// Priority-ordered backends
    #[serde(default = "default_llm_backends")]
    pub backends: Vec<LlmBackendConfig>,

    /// Per-attempt generation timeout, ms (T_llm)
    #[serde(default = "default_llm_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Minimum-length sanity check on generated text, characters
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

fn default_llm_backends() -> Vec<LlmBackendConfig> {
    vec![LlmBackendConfig {
        name: "local".to_string(),
        provider: LlmProviderKind::Ollama,
        endpoint: endpoints::OLLAMA_DEFAULT.clone(),
        model_id: "qwen2.5:7b-instruct".to_string(),
        api_key: None,
        priority: 0,
        max_tokens: default_llm_max_tokens(),
        temperature: default_llm_temperature(),
        max_inflight: default_llm_max_inflight(),
    }]
}
fn default_llm_timeout_ms() -> u64 {
    timeouts::LLM_REQUEST_MS
}
fn default_min_answer_chars() -> usize {
    16
}

impl Default for LlmPoolConfig {
    fn default() -> Self {
        Self {
            backends: default_llm_backends(),
            request_timeout_ms: default_llm_timeout_ms(),
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

/// Web-search fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Master switch for the fallback path
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Cache TTL for identical (query, lang) pairs, seconds (W)
    #[serde(default = "default_search_ttl_s")]
    pub ttl_s: u64,

    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_search_endpoint() -> String {
    endpoints::SEARCH_DEFAULT.clone()
}
fn default_search_max_results() -> usize {
    5
}
fn default_search_ttl_s() -> u64 {
    3600
}
fn default_search_timeout_ms() -> u64 {
    timeouts::WEB_SEARCH_MS
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: default_search_endpoint(),
            max_results: default_search_max_results(),
            ttl_s: default_search_ttl_s(),
            timeout_ms: default_search_timeout_ms(),
        }
    }
}

/// Wall-clock budget per stage, ms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBudgets {
    #[serde(default = "default_budget_classify")]
    pub classify: u64,
    #[serde(default = "default_budget_rewrite")]
    pub rewrite: u64,
    #[serde(default = "default_budget_search")]
    pub search: u64,
    #[serde(default = "default_budget_augment")]
    pub augment: u64,
    #[serde(default = "default_budget_rerank")]
    pub rerank: u64,
    #[serde(default = "default_budget_compress")]
    pub compress: u64,
    #[serde(default = "default_budget_answer")]
    pub answer: u64,
    #[serde(default = "default_budget_websearch")]
    pub websearch: u64,
}

fn default_budget_classify() -> u64 {
    200
}
fn default_budget_rewrite() -> u64 {
    500
}
fn default_budget_search() -> u64 {
    3000
}
fn default_budget_augment() -> u64 {
    1500
}
fn default_budget_rerank() -> u64 {
    800
}
fn default_budget_compress() -> u64 {
    2000
}
fn default_budget_answer() -> u64 {
    12000
}
fn default_budget_websearch() -> u64 {
    6000
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            classify: default_budget_classify(),
            rewrite: default_budget_rewrite(),
            search: default_budget_search(),
            augment: default_budget_augment(),
            rerank: default_budget_rerank(),
            compress: default_budget_compress(),
            answer: default_budget_answer(),
            websearch: default_budget_websearch(),
        }
    }
}

impl StageBudgets {
    /// Map view for trace annotations
    pub fn as_map(&self) -> HashMap<&'static str, u64> {
        HashMap::from([
            ("classify", self.classify),
            ("rewrite", self.rewrite),
            ("search", self.search),
            ("augment", self.augment),
            ("rerank", self.rerank),
            ("compress", self.compress),
            ("answer", self.answer),
            ("websearch", self.websearch),
        ])
    }
}

/// Per-worker confidence thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerThresholds {
    #[serde(default = "default_thr_rewrite")]
    pub rewrite: f32,
    #[serde(default = "default_thr_search")]
    pub search: f32,
    #[serde(default = "default_thr_augment")]
    pub augment: f32,
    #[serde(default = "default_thr_rerank")]
    pub rerank: f32,
    #[serde(default = "default_thr_compress")]
    pub compress: f32,
    #[serde(default = "default_thr_answer")]
    pub answer: f32,
}

fn default_thr_rewrite() -> f32 {
    0.6
}
fn default_thr_search() -> f32 {
    0.7
}
fn default_thr_augment() -> f32 {
    0.75
}
fn default_thr_rerank() -> f32 {
    0.8
}
fn default_thr_compress() -> f32 {
    0.85
}
fn default_thr_answer() -> f32 {
    0.9
}

impl Default for WorkerThresholds {
    fn default() -> Self {
        Self {
            rewrite: default_thr_rewrite(),
            search: default_thr_search(),
            augment: default_thr_augment(),
            rerank: default_thr_rerank(),
            compress: default_thr_compress(),
            answer: default_thr_answer(),
        }
    }
}

/// Leader confidence gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Leader confidence floor for a RAG answer
    #[serde(default = "default_rag_threshold")]
    pub confidence_threshold_rag: f32,

    /// Web fallback confidence floor
    #[serde(default = "default_fallback_threshold")]
    pub confidence_threshold_fallback: f32,

    /// Weight on the best hybrid score (w1)
    #[serde(default = "default_w_best_hybrid")]
    pub w_best_hybrid: f32,

    /// Weight on the answer worker confidence (w2)
    #[serde(default = "default_w_answer")]
    pub w_answer: f32,
}

fn default_rag_threshold() -> f32 {
    gate::RAG_CONFIDENCE
}
fn default_fallback_threshold() -> f32 {
    gate::FALLBACK_CONFIDENCE
}
fn default_w_best_hybrid() -> f32 {
    gate::W_BEST_HYBRID
}
fn default_w_answer() -> f32 {
    gate::W_ANSWER
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confidence_threshold_rag: default_rag_threshold(),
            confidence_threshold_fallback: default_fallback_threshold(),
            w_best_hybrid: default_w_best_hybrid(),
            w_answer: default_w_answer(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stage_budgets_ms: StageBudgets,

    #[serde(default)]
    pub thresholds: WorkerThresholds,

    #[serde(default)]
    pub gate: GateConfig,

    /// Candidates kept after leader merge (K_merge)
    #[serde(default = "default_k_merge")]
    pub k_merge: usize,

    /// Candidates kept after rerank (K_r)
    #[serde(default = "default_k_rerank")]
    pub k_rerank: usize,

    /// Compressed context token ceiling (L_ctx)
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,

    /// Extra neighbouring-context tokens per candidate (A)
    #[serde(default = "default_augment_tokens")]
    pub augment_tokens: usize,

    /// Sentence-to-query similarity floor in the compressor
    #[serde(default = "default_min_sentence_similarity")]
    pub min_sentence_similarity: f32,
}

fn default_k_merge() -> usize {
    retrieval::K_MERGE
}
fn default_k_rerank() -> usize {
    retrieval::K_RERANK
}
fn default_context_tokens() -> usize {
    retrieval::CONTEXT_TOKENS
}
fn default_augment_tokens() -> usize {
    retrieval::AUGMENT_TOKENS
}
fn default_min_sentence_similarity() -> f32 {
    retrieval::MIN_SENTENCE_SIMILARITY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_budgets_ms: StageBudgets::default(),
            thresholds: WorkerThresholds::default(),
            gate: GateConfig::default(),
            k_merge: default_k_merge(),
            k_rerank: default_k_rerank(),
            context_tokens: default_context_tokens(),
            augment_tokens: default_augment_tokens(),
            min_sentence_similarity: default_min_sentence_similarity(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_retrieval()?;
        self.validate_pipeline()?;
        self.validate_recommender()?;
        self.validate_llm()?;
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        if !(0.0..=1.0).contains(&r.hybrid_alpha) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.hybrid_alpha".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", r.hybrid_alpha),
            });
        }

        if r.embedding_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.embedding_dim".to_string(),
                message: "Must be positive".to_string(),
            });
        }

        if r.search_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.search_top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if r.pool_max_outstanding == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.pool_max_outstanding".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;

        for (field, value) in [
            ("pipeline.gate.confidence_threshold_rag", p.gate.confidence_threshold_rag),
            (
                "pipeline.gate.confidence_threshold_fallback",
                p.gate.confidence_threshold_fallback,
            ),
            ("pipeline.min_sentence_similarity", p.min_sentence_similarity),
            ("pipeline.thresholds.rewrite", p.thresholds.rewrite),
            ("pipeline.thresholds.search", p.thresholds.search),
            ("pipeline.thresholds.augment", p.thresholds.augment),
            ("pipeline.thresholds.rerank", p.thresholds.rerank),
            ("pipeline.thresholds.compress", p.thresholds.compress),
            ("pipeline.thresholds.answer", p.thresholds.answer),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if p.k_merge == 0 || p.k_rerank == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.k_merge/k_rerank".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if p.k_rerank > p.k_merge {
            tracing::warn!(
                "pipeline.k_rerank ({}) exceeds k_merge ({}); rerank output is bounded by merge",
                p.k_rerank,
                p.k_merge
            );
        }

        if self.server.request_budget_ms < 1000 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_budget_ms".to_string(),
                message: "Request budget too low (minimum 1000ms)".to_string(),
            });
        }

        Ok(())
    }

    fn validate_recommender(&self) -> Result<(), ConfigError> {
        let r = &self.recommender;

        if r.k_cf == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recommender.k_cf".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if r.cf_halflife_days <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "recommender.cf_halflife_days".to_string(),
                message: format!("Must be positive, got {}", r.cf_halflife_days),
            });
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.backends.is_empty() {
            return Err(ConfigError::MissingField("llm.backends".to_string()));
        }

        for backend in &self.llm.backends {
            if backend.endpoint.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("llm.backends.{}.endpoint", backend.name),
                    message: "Endpoint must not be empty".to_string(),
                });
            }
            if backend.max_inflight == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("llm.backends.{}.max_inflight", backend.name),
                    message: "Must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("PODWISE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
