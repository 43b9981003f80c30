//! Centralized constants
//!
//! Single source of truth for default endpoints and tuning values shared
//! between `settings.rs` defaults and per-crate config structs. Values here
//! are infrastructure defaults only; anything operators are expected to tune
//! is surfaced through `Settings`.

/// Service endpoints (loaded from env vars with fallback defaults)
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// Ollama endpoint used for embeddings and local generation (env: OLLAMA_URL)
    pub static OLLAMA_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
    });

    /// Qdrant vector index endpoint (env: QDRANT_URL)
    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
    });

    /// OpenAI-compatible API endpoint (env: OPENAI_API_BASE)
    pub static OPENAI_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
    });

    /// Web search provider endpoint, SearxNG JSON API shape (env: SEARCH_URL)
    pub static SEARCH_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("SEARCH_URL").unwrap_or_else(|_| "http://localhost:8888/search".to_string())
    });
}

/// Timeouts and budgets (milliseconds unless noted)
pub mod timeouts {
    /// Overall request budget (T_req)
    pub const REQUEST_BUDGET_MS: u64 = 30_000;

    /// LLM generation timeout per backend attempt (T_llm)
    pub const LLM_REQUEST_MS: u64 = 10_000;

    /// Embedding backend request timeout
    pub const EMBED_REQUEST_MS: u64 = 5_000;

    /// Web search provider timeout
    pub const WEB_SEARCH_MS: u64 = 5_000;

    /// Wait for a slot in the shared connection pool (T_pool)
    pub const POOL_WAIT_MS: u64 = 2_000;
}

/// Retrieval and fusion tuning
pub mod retrieval {
    /// Semantic vs tag weight in the hybrid score
    pub const HYBRID_ALPHA: f32 = 0.7;

    /// Candidates per hybrid search (W2 ceiling)
    pub const SEARCH_TOP_K: usize = 8;

    /// Candidates kept after leader merge (K_merge)
    pub const K_MERGE: usize = 8;

    /// Candidates kept after rerank (K_r)
    pub const K_RERANK: usize = 5;

    /// Compressed context token ceiling (L_ctx)
    pub const CONTEXT_TOKENS: usize = 2048;

    /// Extra tokens of neighbouring context per candidate (A)
    pub const AUGMENT_TOKENS: usize = 256;

    /// Sentence-to-query similarity floor in the compressor
    pub const MIN_SENTENCE_SIMILARITY: f32 = 0.35;

    /// Same-podcast diversity penalty applied by the reranker
    pub const DIVERSITY_PENALTY: f32 = 0.15;
}

/// Confidence gate defaults
pub mod gate {
    /// Leader confidence floor for a RAG answer
    pub const RAG_CONFIDENCE: f32 = 0.7;

    /// Web fallback confidence floor
    pub const FALLBACK_CONFIDENCE: f32 = 0.7;

    /// Gate weight on the best hybrid score (w1)
    pub const W_BEST_HYBRID: f32 = 0.6;

    /// Gate weight on the answer worker confidence (w2)
    pub const W_ANSWER: f32 = 0.4;

    /// Secondary category confidence floor for multi-dispatch
    pub const MULTI_SECONDARY_MIN: f32 = 0.4;

    /// Secondary must reach this share of the primary score
    pub const MULTI_SECONDARY_RATIO: f32 = 0.6;

    /// Final-score floor for including an episode in the recommendations
    pub const RECOMMEND_SCORE_MIN: f32 = 0.7;
}

/// Collaborative filtering defaults
pub mod recommender {
    /// Neighbourhood size (k_cf)
    pub const NEIGHBOURS: usize = 10;

    /// Interactions required before a user leaves cold-start
    pub const MIN_INTERACTIONS: usize = 5;

    /// Rating age-decay half-life, days
    pub const HALF_LIFE_DAYS: f32 = 30.0;
}

/// Retry policy at backend boundaries
pub mod retries {
    /// Attempts for embedding, LLM, and web-search calls (R)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Initial backoff, doubled each retry, with jitter
    pub const INITIAL_BACKOFF_MS: u64 = 100;
}
