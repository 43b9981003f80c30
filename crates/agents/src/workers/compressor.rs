//! W5 - context compressor
//!
//! Extractive compression: each candidate is split into sentences, sentences
//! whose embedding similarity to the query falls below the floor are
//! dropped, and the survivors are packed into the context token ceiling in
//! candidate order.

use async_trait::async_trait;
use std::sync::Arc;

use podwise_core::{Candidate, Embedder};

use crate::worker::Worker;
use crate::workers::{estimate_tokens, split_sentences};
use crate::AgentError;

/// W5 input
#[derive(Debug, Clone)]
pub struct CompressInput {
    pub candidates: Vec<Candidate>,
    pub query: String,
}

/// W5 output
#[derive(Debug, Clone)]
pub struct CompressedContext {
    /// Context handed to the answerer
    pub text: String,
    pub kept_sentences: usize,
    pub dropped_sentences: usize,
    pub estimated_tokens: usize,
}

/// Context compressor worker
pub struct Compressor {
    embedder: Arc<dyn Embedder>,
    /// Context ceiling in tokens (L_ctx)
    max_tokens: usize,
    /// Sentence similarity floor
    min_similarity: f32,
}

impl Compressor {
    pub fn new(embedder: Arc<dyn Embedder>, max_tokens: usize, min_similarity: f32) -> Self {
        Self {
            embedder,
            max_tokens,
            min_similarity,
        }
    }
}

/// Dot product; embedders hand out unit vectors so this is cosine
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl Worker for Compressor {
    type Input = CompressInput;
    type Output = CompressedContext;

    fn name(&self) -> &'static str {
        "compress"
    }

    async fn execute(
        &self,
        input: CompressInput,
    ) -> Result<(CompressedContext, f32), AgentError> {
        let query_vector = self.embedder.embed(&input.query).await?;

        let candidate_count = input.candidates.len();
        let mut contributing = 0usize;
        let mut kept = 0usize;
        let mut dropped = 0usize;
        let mut used_tokens = 0usize;
        let mut parts: Vec<String> = Vec::new();

        'candidates: for candidate in &input.candidates {
            let sentences = split_sentences(&candidate.text);
            if sentences.is_empty() {
                continue;
            }

            let vectors = self.embedder.embed_batch(&sentences).await?;
            let mut candidate_contributed = false;

            for (sentence, vector) in sentences.iter().zip(vectors.iter()) {
                if similarity(&query_vector, vector) < self.min_similarity {
                    dropped += 1;
                    continue;
                }

                let cost = estimate_tokens(sentence);
                if used_tokens + cost > self.max_tokens {
                    // Ceiling reached; anything further would overflow
                    if candidate_contributed {
                        contributing += 1;
                    }
                    break 'candidates;
                }

                used_tokens += cost;
                kept += 1;
                candidate_contributed = true;
                parts.push(sentence.clone());
            }

            if candidate_contributed {
                contributing += 1;
            }
        }

        let coverage = if candidate_count == 0 {
            0.0
        } else {
            contributing as f32 / candidate_count as f32
        };
        let confidence = 0.6 + 0.4 * coverage;

        Ok((
            CompressedContext {
                text: parts.join(" "),
                kept_sentences: kept,
                dropped_sentences: dropped,
                estimated_tokens: used_tokens,
            },
            confidence,
        ))
    }

    /// Timeout fallback: plain truncation to the ceiling, no filtering
    fn on_timeout(&self, input: CompressInput) -> CompressedContext {
        let mut used_tokens = 0usize;
        let mut kept = 0usize;
        let mut parts: Vec<String> = Vec::new();

        'outer: for candidate in &input.candidates {
            for sentence in split_sentences(&candidate.text) {
                let cost = estimate_tokens(&sentence);
                if used_tokens + cost > self.max_tokens {
                    break 'outer;
                }
                used_tokens += cost;
                kept += 1;
                parts.push(sentence);
            }
        }

        CompressedContext {
            text: parts.join(" "),
            kept_sentences: kept,
            dropped_sentences: 0,
            estimated_tokens: used_tokens,
        }
    }

    fn input_size(&self, input: &CompressInput) -> usize {
        input.candidates.len()
    }

    fn output_size(&self, output: &CompressedContext) -> usize {
        output.estimated_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::run_with_budget;
    use podwise_core::{Category, Error};
    use std::time::Duration;

    /// Similarity is keyword overlap with "investing"; vectors stay unit length
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
            if text.contains("investing") || text.contains("投資") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn dim(&self) -> usize {
            2
        }
    }

    fn candidate(text: &str) -> Candidate {
        Candidate {
            chunk_id: "c".into(),
            episode_id: "e".into(),
            podcast_id: "p".into(),
            chunk_index: 0,
            text: text.into(),
            semantic_score: 0.8,
            tag_score: 0.5,
            hybrid_score: 0.7,
            matched_tags: Vec::new(),
            recency_score: 0.0,
            category: Category::Business,
            podcast_name: "show".into(),
            source_stage: "rerank".into(),
        }
    }

    #[tokio::test]
    async fn test_off_topic_sentences_dropped() {
        let compressor = Compressor::new(Arc::new(KeywordEmbedder), 2048, 0.5);
        let input = CompressInput {
            candidates: vec![candidate(
                "investing basics are covered. the weather was nice. more investing advice.",
            )],
            query: "investing".into(),
        };

        let outcome = run_with_budget(&compressor, input, Duration::from_secs(1))
            .await
            .unwrap();

        let ctx = outcome.output;
        assert_eq!(ctx.kept_sentences, 2);
        assert_eq!(ctx.dropped_sentences, 1);
        assert!(!ctx.text.contains("weather"));
    }

    #[tokio::test]
    async fn test_token_ceiling_respected() {
        let compressor = Compressor::new(Arc::new(KeywordEmbedder), 4, 0.0);
        let input = CompressInput {
            candidates: vec![candidate(
                "investing one sentence here. investing another long sentence follows.",
            )],
            query: "investing".into(),
        };

        let outcome = run_with_budget(&compressor, input, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(outcome.output.estimated_tokens <= 4);
    }

    #[tokio::test]
    async fn test_empty_candidates_give_empty_context() {
        let compressor = Compressor::new(Arc::new(KeywordEmbedder), 2048, 0.5);
        let input = CompressInput {
            candidates: Vec::new(),
            query: "investing".into(),
        };

        let outcome = run_with_budget(&compressor, input, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(outcome.output.text.is_empty());
        assert_eq!(outcome.confidence, 0.6);
    }
}
