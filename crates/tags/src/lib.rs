//! Tag vocabulary and sparse matching
//!
//! Features:
//! - Closed category -> tag -> synonym vocabulary loaded from YAML
//! - Token and phrase matching with canonical/synonym scoring
//! - Jaccard overlap between tag sets
//! - Atomic hot-reload via a swap handle; readers never take a lock

pub mod matcher;
pub mod vocabulary;

pub use matcher::{tag_overlap, TagMatch, TagMatcher};
pub use vocabulary::{Tag, Vocabulary, VocabularyHandle};

use thiserror::Error;

/// Vocabulary errors
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Failed to read vocabulary: {0}")]
    Io(String),

    #[error("Malformed vocabulary: {0}")]
    Malformed(String),

    #[error("Duplicate tag name: {0}")]
    DuplicateTag(String),

    #[error("Synonym '{synonym}' appears under both '{first}' and '{second}'")]
    DuplicateSynonym {
        synonym: String,
        first: String,
        second: String,
    },

    #[error("Invalid weight {weight} for tag '{tag}': must be in [0,1]")]
    InvalidWeight { tag: String, weight: f32 },
}

impl From<TagError> for podwise_core::Error {
    fn from(err: TagError) -> Self {
        podwise_core::Error::Config(err.to_string())
    }
}
