//! W2 - hybrid searcher
//!
//! Dense ANN over the vector index plus the sparse tag signal, fused into
//! `hybrid = alpha * semantic + (1 - alpha) * tag`. Returns at most the
//! configured candidate ceiling.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use podwise_core::{Candidate, Category, ChunkFilter, Embedder, VectorIndex};
use podwise_retrieval::RequestPool;
use podwise_tags::tag_overlap;

use crate::worker::Worker;
use crate::workers::rewriter::RewrittenQuery;
use crate::AgentError;

/// Freshness decay half-life, days
const RECENCY_HALF_LIFE_DAYS: f32 = 180.0;

/// W2 input
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub rewritten: RewrittenQuery,
    pub category: Option<Category>,
    pub lang: Option<String>,
}

/// Hybrid searcher worker
pub struct HybridSearcher {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    pool: RequestPool,
    alpha: f32,
    top_k: usize,
}

impl HybridSearcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        pool: RequestPool,
        alpha: f32,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            pool,
            alpha,
            top_k,
        }
    }

    fn recency_of(published_ts: Option<i64>) -> f32 {
        match published_ts {
            Some(ts) => {
                let age_days = (Utc::now().timestamp() - ts).max(0) as f32 / 86_400.0;
                0.5_f32.powf(age_days / RECENCY_HALF_LIFE_DAYS)
            }
            None => 0.0,
        }
    }
}

#[async_trait]
impl Worker for HybridSearcher {
    type Input = SearchRequest;
    type Output = Vec<Candidate>;

    fn name(&self) -> &'static str {
        "search"
    }

    async fn execute(&self, input: SearchRequest) -> Result<(Vec<Candidate>, f32), AgentError> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(podwise_core::Error::from)?;

        let vector = self.embedder.embed(&input.rewritten.rewritten).await?;

        let filter = ChunkFilter {
            category: input.category,
            tags: Vec::new(),
            language: input.lang.clone(),
            podcast_id: None,
        };

        let hits = self.index.search(&vector, &filter, self.top_k).await?;

        let query_tags = &input.rewritten.matched_tag_names;
        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| {
                let tag_score = tag_overlap(query_tags, &hit.tags);
                let matched_tags: Vec<String> = hit
                    .tags
                    .iter()
                    .filter(|t| query_tags.contains(t))
                    .cloned()
                    .collect();
                let mut candidate = Candidate {
                    chunk_id: hit.chunk_id,
                    episode_id: hit.episode_id,
                    podcast_id: hit.podcast_id,
                    chunk_index: hit.chunk_index,
                    text: hit.text,
                    semantic_score: hit.score,
                    tag_score,
                    hybrid_score: 0.0,
                    matched_tags,
                    recency_score: Self::recency_of(hit.published_ts),
                    category: hit.category,
                    podcast_name: hit.podcast_name,
                    source_stage: "search".to_string(),
                };
                candidate.fuse_scores(self.alpha);
                candidate
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        candidates.truncate(self.top_k);

        // Confidence mirrors the expert formula: mean of the top-3 hybrids
        let top: Vec<f32> = candidates.iter().take(3).map(|c| c.hybrid_score).collect();
        let confidence = if top.is_empty() {
            0.0
        } else {
            top.iter().sum::<f32>() / top.len() as f32
        };

        Ok((candidates, confidence))
    }

    fn on_timeout(&self, _input: SearchRequest) -> Vec<Candidate> {
        Vec::new()
    }

    fn input_size(&self, input: &SearchRequest) -> usize {
        input.rewritten.rewritten.chars().count()
    }

    fn output_size(&self, output: &Vec<Candidate>) -> usize {
        output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::run_with_budget;
    use crate::workers::rewriter::QueryIntent;
    use podwise_core::{ChunkHit, Error};
    use std::time::Duration;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
            Ok(vec![1.0, 0.0])
        }

        fn dim(&self) -> usize {
            2
        }
    }

    struct FixedIndex {
        hits: Vec<ChunkHit>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn search(
            &self,
            _vector: &[f32],
            filter: &ChunkFilter,
            k: usize,
        ) -> Result<Vec<ChunkHit>, Error> {
            Ok(self
                .hits
                .iter()
                .filter(|h| filter.category.map_or(true, |c| h.category == c))
                .take(k)
                .cloned()
                .collect())
        }

        async fn neighbours(
            &self,
            _episode_id: &str,
            _chunk_index: u32,
            _radius: u32,
        ) -> Result<Vec<ChunkHit>, Error> {
            Ok(Vec::new())
        }
    }

    fn hit(chunk_id: &str, score: f32, tags: &[&str], category: Category) -> ChunkHit {
        ChunkHit {
            chunk_id: chunk_id.into(),
            episode_id: format!("ep-{}", chunk_id),
            podcast_id: "p1".into(),
            podcast_name: "show".into(),
            chunk_index: 0,
            text: "chunk text".into(),
            score,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            category,
            language: "zh".into(),
            published_ts: None,
        }
    }

    fn request(tags: &[&str], category: Option<Category>) -> SearchRequest {
        SearchRequest {
            rewritten: RewrittenQuery {
                original: "q".into(),
                rewritten: "q expanded".into(),
                expansions: Vec::new(),
                entities: Vec::new(),
                intent: QueryIntent::Explore,
                inferred_domain: category,
                matched_tag_names: tags.iter().map(|s| s.to_string()).collect(),
            },
            category,
            lang: None,
        }
    }

    fn searcher(hits: Vec<ChunkHit>) -> HybridSearcher {
        HybridSearcher::new(
            Arc::new(FixedEmbedder),
            Arc::new(FixedIndex { hits }),
            RequestPool::new(4, Duration::from_millis(100)),
            0.7,
            8,
        )
    }

    #[tokio::test]
    async fn test_hybrid_fusion_orders_candidates() {
        let searcher = searcher(vec![
            hit("a", 0.6, &["investing"], Category::Business),
            hit("b", 0.9, &[], Category::Business),
        ]);

        let outcome = run_with_budget(
            &searcher,
            request(&["investing"], Some(Category::Business)),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let candidates = outcome.output;
        assert_eq!(candidates.len(), 2);
        for c in &candidates {
            assert!((0.0..=1.0).contains(&c.hybrid_score));
            let expected = 0.7 * c.semantic_score + 0.3 * c.tag_score;
            assert!((c.hybrid_score - expected).abs() < 1e-6);
        }
        // a: 0.7*0.6 + 0.3*1.0 = 0.72 beats b: 0.7*0.9 = 0.63
        assert_eq!(candidates[0].chunk_id, "a");
        assert_eq!(candidates[0].matched_tags, vec!["investing".to_string()]);
    }

    #[tokio::test]
    async fn test_category_filter_restricts_hits() {
        let searcher = searcher(vec![
            hit("biz", 0.9, &[], Category::Business),
            hit("edu", 0.9, &[], Category::Education),
        ]);

        let outcome = run_with_budget(
            &searcher,
            request(&[], Some(Category::Education)),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(outcome.output.len(), 1);
        assert_eq!(outcome.output[0].chunk_id, "edu");
    }

    #[tokio::test]
    async fn test_no_hits_low_confidence() {
        let searcher = searcher(Vec::new());
        let outcome = run_with_budget(
            &searcher,
            request(&[], None),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(outcome.output.is_empty());
        assert_eq!(outcome.confidence, 0.0);
        assert!(!outcome.clears(0.7));
    }
}
