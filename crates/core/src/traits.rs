//! Dependency traits for consumed backends
//!
//! The engine owns no stores. Everything external (embedding backend, vector
//! index, episode lookup, web search) is reached through one of these narrow
//! interfaces, so tests can swap in in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Category, Episode, Error};

/// Dense text embedding backend
///
/// Implementations must be deterministic for equal input and return vectors
/// of the dimension negotiated at startup.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Fixed output dimension
    fn dim(&self) -> usize;
}

/// Conjunctive metadata filter for index search
///
/// Restricted to AND of equality/IN predicates, matching the filter grammar
/// the index supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkFilter {
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub podcast_id: Option<String>,
}

impl ChunkFilter {
    pub fn for_category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.tags.is_empty()
            && self.language.is_none()
            && self.podcast_id.is_none()
    }
}

/// One hit from the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub episode_id: String,
    pub podcast_id: String,
    pub podcast_name: String,
    pub chunk_index: u32,
    pub text: String,
    /// Cosine similarity in [0,1]
    pub score: f32,
    pub tags: Vec<String>,
    pub category: Category,
    pub language: String,
    /// Episode publish time, seconds since epoch, when the index has it
    pub published_ts: Option<i64>,
}

/// ANN search over chunk embeddings
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// At most `k` hits; identical queries return identical orderings.
    async fn search(
        &self,
        vector: &[f32],
        filter: &ChunkFilter,
        k: usize,
    ) -> Result<Vec<ChunkHit>, Error>;

    /// Chunks adjacent to the given one within the same episode, used by the
    /// augmenter to widen context.
    async fn neighbours(
        &self,
        episode_id: &str,
        chunk_index: u32,
        radius: u32,
    ) -> Result<Vec<ChunkHit>, Error>;
}

/// Episode lookup by id
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Missing ids are silently omitted from the result.
    async fn get_episodes_by_ids(&self, ids: &[String]) -> Result<Vec<Episode>, Error>;

    /// Episode ids restricted to a category, for the direct recommendation
    /// endpoint.
    async fn episode_ids_in_category(&self, category: Category) -> Result<Vec<String>, Error>;
}

/// One external search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub confidence: f32,
}

/// External search result with generated summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub results: Vec<WebSearchHit>,
    pub summary: String,
    pub confidence: f32,
}

impl WebSearchResponse {
    /// The zero-confidence response used when the provider fails
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            summary: String::new(),
            confidence: 0.0,
        }
    }
}

/// External web-search provider
///
/// Never raises on provider error; implementations degrade to
/// `WebSearchResponse::empty()`.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize, lang: &str) -> WebSearchResponse;

    /// Component probe map for the health endpoint
    fn probe_name(&self) -> &'static str {
        "web_search"
    }
}

/// Health probe outcome per component, keyed by component name
pub type ComponentHealth = HashMap<String, bool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_empty() {
        assert!(ChunkFilter::default().is_empty());
        assert!(!ChunkFilter::for_category(Category::Business).is_empty());
    }

    #[test]
    fn test_empty_web_response() {
        let r = WebSearchResponse::empty();
        assert_eq!(r.confidence, 0.0);
        assert!(r.results.is_empty());
    }
}
