//! Retrieval candidate
//!
//! Created by the hybrid searcher, mutated (augmented, reranked, compressed)
//! along the pipeline, and dropped when the response is built.

use serde::{Deserialize, Serialize};

use crate::Category;

/// A retrieved chunk flowing through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Chunk id, unique within the index
    pub chunk_id: String,
    /// Episode the chunk belongs to
    pub episode_id: String,
    /// Podcast the episode belongs to
    pub podcast_id: String,
    /// Chunk position within the episode transcript
    pub chunk_index: u32,
    /// Chunk text; grows when the augmenter attaches neighbouring context
    pub text: String,
    /// Dense cosine similarity in [0,1]
    pub semantic_score: f32,
    /// Sparse tag overlap in [0,1]
    pub tag_score: f32,
    /// Blended score, maintained via `fuse_scores`
    pub hybrid_score: f32,
    /// Tag names that matched the query
    pub matched_tags: Vec<String>,
    /// Episode freshness in [0,1]; 0 when the index has no publish time
    pub recency_score: f32,
    /// Category the chunk is indexed under
    pub category: Category,
    /// Podcast display name for response shaping
    pub podcast_name: String,
    /// Pipeline stage that produced the current state
    pub source_stage: String,
}

impl Candidate {
    /// Recompute the hybrid score with the configured semantic weight
    ///
    /// Inputs are clamped so a misbehaving backend can never push a score
    /// outside [0,1].
    pub fn fuse_scores(&mut self, alpha: f32) {
        self.semantic_score = self.semantic_score.clamp(0.0, 1.0);
        self.tag_score = self.tag_score.clamp(0.0, 1.0);
        let alpha = alpha.clamp(0.0, 1.0);
        self.hybrid_score = alpha * self.semantic_score + (1.0 - alpha) * self.tag_score;
    }

    /// Mark the stage that last touched this candidate
    pub fn touch(&mut self, stage: &str) {
        self.source_stage = stage.to_string();
    }
}
