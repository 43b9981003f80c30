//! Dense retrieval plumbing
//!
//! Features:
//! - HTTP embedding client with retry, backoff, and a startup dimension probe
//! - Qdrant-backed vector index with conjunctive metadata filters
//! - Shared bounded request pool guarding both backends

pub mod embedding;
pub mod index;
pub mod pool;

pub use embedding::{EmbeddingConfig, HttpEmbedder};
pub use index::{IndexConfig, QdrantIndex};
pub use pool::RequestPool;

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Embedding dimension mismatch: backend returned {actual}, configured {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request pool saturated after {0}ms")]
    PoolSaturated(u64),
}

impl From<RetrievalError> for podwise_core::Error {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::PoolSaturated(ms) => {
                podwise_core::Error::ResourceExhausted(format!("retrieval pool ({}ms)", ms))
            }
            RetrievalError::DimensionMismatch { .. } => podwise_core::Error::Config(err.to_string()),
            RetrievalError::EmbeddingUnavailable(msg) => {
                podwise_core::Error::backend("embedding", msg)
            }
            other => podwise_core::Error::backend("vector_index", other.to_string()),
        }
    }
}
