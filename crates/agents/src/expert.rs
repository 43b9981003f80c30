//! Category experts
//!
//! An expert is a retrieval specialist scoped to one category: it runs the
//! rewriter, its category-filtered hybrid search, and the reranker strictly
//! in sequence, then scores itself on its top candidates. Experts never call
//! the LLM.

use std::sync::Arc;
use std::time::Duration;

use podwise_config::{StageBudgets, WorkerThresholds};
use podwise_core::{Candidate, Category, TraceEntry};

use crate::worker::run_with_budget;
use crate::workers::rewriter::QueryRewriter;
use crate::workers::searcher::{HybridSearcher, SearchRequest};
use crate::workers::reranker::Reranker;
use crate::AgentError;

/// What an expert hands back to the leader
#[derive(Debug, Clone)]
pub struct ExpertReport {
    pub category: Category,
    pub candidates: Vec<Candidate>,
    /// Mean of the top-3 hybrid scores
    pub expert_confidence: f32,
    pub trace: Vec<TraceEntry>,
}

/// One domain-scoped expert
pub struct CategoryExpert {
    category: Category,
    rewriter: Arc<QueryRewriter>,
    searcher: Arc<HybridSearcher>,
    reranker: Arc<Reranker>,
}

impl CategoryExpert {
    pub fn new(
        category: Category,
        rewriter: Arc<QueryRewriter>,
        searcher: Arc<HybridSearcher>,
        reranker: Arc<Reranker>,
    ) -> Self {
        Self {
            category,
            rewriter,
            searcher,
            reranker,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// W1 -> W2 (category filter) -> W4, strictly sequential
    pub async fn run(
        &self,
        query_text: &str,
        lang: Option<String>,
        budgets: &StageBudgets,
        thresholds: &WorkerThresholds,
    ) -> Result<ExpertReport, AgentError> {
        let mut trace = Vec::new();
        let prefix = self.category.as_str();

        let rewrite = run_with_budget(
            self.rewriter.as_ref(),
            query_text.to_string(),
            Duration::from_millis(budgets.rewrite),
        )
        .await?;
        trace.push(scoped(
            annotated(rewrite.trace.clone(), rewrite.clears(thresholds.rewrite)),
            prefix,
        ));

        let search = run_with_budget(
            self.searcher.as_ref(),
            SearchRequest {
                rewritten: rewrite.output,
                category: Some(self.category),
                lang,
            },
            Duration::from_millis(budgets.search),
        )
        .await?;
        trace.push(scoped(
            annotated(search.trace.clone(), search.clears(thresholds.search)),
            prefix,
        ));

        let pre_rerank: Vec<(String, f32)> = search
            .output
            .iter()
            .map(|c| (c.chunk_id.clone(), c.hybrid_score))
            .collect();

        let rerank = run_with_budget(
            self.reranker.as_ref(),
            search.output,
            Duration::from_millis(budgets.rerank),
        )
        .await?;
        let mut rerank_entry =
            annotated(rerank.trace.clone(), rerank.clears(thresholds.rerank));
        rerank_entry.score_deltas = rerank
            .output
            .iter()
            .filter_map(|c| {
                pre_rerank
                    .iter()
                    .find(|(id, _)| id == &c.chunk_id)
                    .map(|(id, before)| (id.clone(), c.hybrid_score - before))
            })
            .collect();
        trace.push(scoped(rerank_entry, prefix));

        let candidates = rerank.output;
        let expert_confidence = confidence_of(&candidates);

        tracing::debug!(
            category = prefix,
            candidates = candidates.len(),
            expert_confidence,
            "Expert finished"
        );

        Ok(ExpertReport {
            category: self.category,
            candidates,
            expert_confidence,
            trace,
        })
    }
}

/// Mean of the top-3 hybrid scores, 0 for an empty set
fn confidence_of(candidates: &[Candidate]) -> f32 {
    let top: Vec<f32> = candidates.iter().take(3).map(|c| c.hybrid_score).collect();
    if top.is_empty() {
        return 0.0;
    }
    top.iter().sum::<f32>() / top.len() as f32
}

fn scoped(mut entry: TraceEntry, prefix: &str) -> TraceEntry {
    entry.stage = format!("{}:{}", prefix, entry.stage);
    entry
}

/// Flag outcomes that fell short of their configured confidence threshold
fn annotated(mut entry: TraceEntry, cleared: bool) -> TraceEntry {
    if !cleared && entry.note.is_none() {
        entry = entry.note("below threshold");
    }
    entry
}
