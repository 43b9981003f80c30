//! W4 - reranker
//!
//! Deterministic score re-weighting `0.6*hybrid + 0.3*tag + 0.1*recency`,
//! with a penalty on repeated podcasts so one show cannot monopolize the
//! final list. Keeps the top K_r.

use async_trait::async_trait;
use std::collections::HashMap;

use podwise_core::Candidate;

use crate::worker::Worker;
use crate::AgentError;

const W_HYBRID: f32 = 0.6;
const W_TAG: f32 = 0.3;
const W_RECENCY: f32 = 0.1;

/// Reranker worker
pub struct Reranker {
    /// Results kept (K_r)
    top_k: usize,
    /// Subtracted per repeated podcast_id occurrence
    diversity_penalty: f32,
}

impl Reranker {
    pub fn new(top_k: usize, diversity_penalty: f32) -> Self {
        Self {
            top_k,
            diversity_penalty,
        }
    }

    fn base_score(candidate: &Candidate) -> f32 {
        W_HYBRID * candidate.hybrid_score
            + W_TAG * candidate.tag_score
            + W_RECENCY * candidate.recency_score
    }
}

#[async_trait]
impl Worker for Reranker {
    type Input = Vec<Candidate>;
    type Output = Vec<Candidate>;

    fn name(&self) -> &'static str {
        "rerank"
    }

    async fn execute(&self, input: Vec<Candidate>) -> Result<(Vec<Candidate>, f32), AgentError> {
        let mut scored: Vec<(f32, Candidate)> = input
            .into_iter()
            .map(|c| (Self::base_score(&c), c))
            .collect();

        // First pass fixes the visit order so the repeat penalty is stable
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
        });

        // Suspension point so the stage budget can actually preempt us
        tokio::task::yield_now().await;

        let mut podcast_seen: HashMap<String, usize> = HashMap::new();
        for (score, candidate) in scored.iter_mut() {
            let repeats = podcast_seen.entry(candidate.podcast_id.clone()).or_insert(0);
            *score = (*score - self.diversity_penalty * *repeats as f32).max(0.0);
            *repeats += 1;
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
        });
        scored.truncate(self.top_k);

        let mut output: Vec<Candidate> = Vec::with_capacity(scored.len());
        for (score, mut candidate) in scored {
            candidate.hybrid_score = score.clamp(0.0, 1.0);
            candidate.touch("rerank");
            output.push(candidate);
        }

        let confidence = output
            .first()
            .map(|c| c.hybrid_score)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Ok((output, confidence))
    }

    /// Timing out leaves the merged order untouched
    fn on_timeout(&self, input: Vec<Candidate>) -> Vec<Candidate> {
        input
    }

    fn input_size(&self, input: &Vec<Candidate>) -> usize {
        input.len()
    }

    fn output_size(&self, output: &Vec<Candidate>) -> usize {
        output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::run_with_budget;
    use podwise_core::Category;
    use std::time::Duration;

    fn candidate(chunk_id: &str, podcast_id: &str, hybrid: f32, tag: f32) -> Candidate {
        Candidate {
            chunk_id: chunk_id.into(),
            episode_id: format!("ep-{}", chunk_id),
            podcast_id: podcast_id.into(),
            chunk_index: 0,
            text: "text".into(),
            semantic_score: hybrid,
            tag_score: tag,
            hybrid_score: hybrid,
            matched_tags: Vec::new(),
            recency_score: 0.0,
            category: Category::Business,
            podcast_name: "show".into(),
            source_stage: "search".into(),
        }
    }

    #[tokio::test]
    async fn test_reweighting_prefers_tagged_candidates() {
        let reranker = Reranker::new(5, 0.15);
        let input = vec![
            candidate("plain", "p1", 0.8, 0.0),
            candidate("tagged", "p2", 0.75, 0.9),
        ];

        let outcome = run_with_budget(&reranker, input, Duration::from_secs(1))
            .await
            .unwrap();

        // 0.6*0.75 + 0.3*0.9 = 0.72 beats 0.6*0.8 = 0.48
        assert_eq!(outcome.output[0].chunk_id, "tagged");
        assert_eq!(outcome.output[0].source_stage, "rerank");
    }

    #[tokio::test]
    async fn test_diversity_penalty_demotes_repeats() {
        let reranker = Reranker::new(5, 0.2);
        let input = vec![
            candidate("a1", "same", 0.9, 0.5),
            candidate("a2", "same", 0.88, 0.5),
            candidate("b1", "other", 0.80, 0.5),
        ];

        let outcome = run_with_budget(&reranker, input, Duration::from_secs(1))
            .await
            .unwrap();

        // The second "same" chunk takes the penalty and drops below "other"
        let order: Vec<&str> = outcome.output.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["a1", "b1", "a2"]);
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let reranker = Reranker::new(2, 0.0);
        let input = (0..6)
            .map(|i| candidate(&format!("c{}", i), &format!("p{}", i), 0.5, 0.5))
            .collect();

        let outcome = run_with_budget(&reranker, input, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.output.len(), 2);
    }

    #[tokio::test]
    async fn test_scores_stay_in_unit_range() {
        let reranker = Reranker::new(5, 0.5);
        let input = vec![
            candidate("a", "p", 1.0, 1.0),
            candidate("b", "p", 0.1, 0.0),
            candidate("c", "p", 0.05, 0.0),
        ];

        let outcome = run_with_budget(&reranker, input, Duration::from_secs(1))
            .await
            .unwrap();
        for c in &outcome.output {
            assert!((0.0..=1.0).contains(&c.hybrid_score));
        }
    }
}
