//! Agent hierarchy
//!
//! Three tiers:
//! - Workers: stateless single-task executors with a typed operation and a
//!   wall-clock budget they must honour
//! - Category experts: retrieval specialists scoped to one category
//! - Leader: classifies queries, merges expert output, gates confidence,
//!   and shapes the final recommendation list
//!
//! Workers never talk to each other; experts own their worker chain; the
//! leader only sees expert reports and worker outcomes handed to it by the
//! pipeline runner.

pub mod expert;
pub mod leader;
pub mod worker;
pub mod workers;

pub use expert::{CategoryExpert, ExpertReport};
pub use leader::{Leader, LeaderVerdict};
pub use worker::{run_with_budget, Worker, WorkerOutcome};
pub use workers::answerer::{AnswerDraft, AnswerInput, Answerer};
pub use workers::augmenter::Augmenter;
pub use workers::compressor::{CompressInput, CompressedContext, Compressor};
pub use workers::reranker::Reranker;
pub use workers::rewriter::{QueryIntent, QueryRewriter, RewrittenQuery};
pub use workers::searcher::{HybridSearcher, SearchRequest};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("Augment error: {0}")]
    Augment(String),

    #[error("Compress error: {0}")]
    Compress(String),

    #[error("Answer error: {0}")]
    Answer(#[from] podwise_llm::LlmError),

    #[error("Backend error: {0}")]
    Backend(#[from] podwise_core::Error),
}

impl From<AgentError> for podwise_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Backend(inner) => inner,
            AgentError::Answer(inner) => inner.into(),
            other => podwise_core::Error::Internal(other.to_string()),
        }
    }
}
