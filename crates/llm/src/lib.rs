//! LLM integration
//!
//! Features:
//! - Multiple backend support (Ollama, OpenAI-compatible)
//! - Priority-ordered pool with per-backend in-flight limits and fallback
//! - Heuristic confidence scoring on generated text
//!
//! Streaming is deliberately not exposed; callers get a single completed
//! generation or an `Unavailable` error they can translate into fallback.

pub mod backend;
pub mod pool;
pub mod prompt;

pub use backend::{
    build_backend, GenerationResult, LlmBackend, OllamaBackend, OpenAiBackend, SingleBackendConfig,
};
pub use pool::{LlmPool, PoolAnswer};
pub use prompt::{Message, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every backend in the pool failed; callers decide whether this is fatal
    #[error("No LLM backend available")]
    Unavailable,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for podwise_core::Error {
    fn from(err: LlmError) -> Self {
        podwise_core::Error::backend("llm", err.to_string())
    }
}
