//! Request execution

use metrics::counter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use podwise_agents::{
    AnswerInput, Answerer, Augmenter, CategoryExpert, CompressInput, Compressor, ExpertReport,
    HybridSearcher, Leader, LeaderVerdict, QueryRewriter, Reranker,
};
use podwise_agents::worker::{run_with_budget, WorkerOutcome};
use podwise_config::Settings;
use podwise_core::{
    Category, Embedder, EpisodeStore, Error, Query, Response, ResponseSource, Trace, TraceEntry,
    VectorIndex, WebSearchProvider,
};
use podwise_llm::LlmPool;
use podwise_recommender::RecommenderHandle;
use podwise_retrieval::RequestPool;
use podwise_tags::VocabularyHandle;

/// External collaborators handed to the runner at construction
pub struct RunnerParts {
    pub vocabulary: Arc<VocabularyHandle>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub episodes: Arc<dyn EpisodeStore>,
    pub recommender: Arc<RecommenderHandle>,
    pub llm: Arc<LlmPool>,
    pub websearch: Arc<dyn WebSearchProvider>,
}

/// Why the pipeline left the happy path
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Leader confidence below the RAG bar
    LowConfidence(f32),
    /// A stage errored; the request degrades instead of failing
    StageFailed(String),
    /// Every LLM backend was down
    LlmUnavailable,
    /// The overall request budget expired
    BudgetExpired,
}

impl FallbackReason {
    fn as_note(&self) -> String {
        match self {
            FallbackReason::LowConfidence(c) => format!("low confidence {:.2}", c),
            FallbackReason::StageFailed(stage) => format!("stage failed: {}", stage),
            FallbackReason::LlmUnavailable => "llm unavailable".to_string(),
            FallbackReason::BudgetExpired => "request budget expired".to_string(),
        }
    }
}

/// Completed run: the response plus its trace
#[derive(Debug)]
pub struct RunReport {
    pub response: Response,
    pub trace: Trace,
}

enum InnerOutcome {
    Rag(Response),
    Fallback(FallbackReason),
}

/// Copy a worker's trace entry, flagging a missed confidence threshold
fn threshold_note<T>(outcome: &WorkerOutcome<T>, threshold: f32) -> TraceEntry {
    let mut entry = outcome.trace.clone();
    if !outcome.clears(threshold) && entry.note.is_none() {
        entry = entry.note("below threshold");
    }
    entry
}

/// Six-stage pipeline controller
pub struct PipelineRunner {
    experts: Vec<Arc<CategoryExpert>>,
    leader: Leader,
    augmenter: Arc<Augmenter>,
    compressor: Arc<Compressor>,
    answerer: Arc<Answerer>,
    websearch: Arc<dyn WebSearchProvider>,
    settings: Settings,
}

impl PipelineRunner {
    /// Assemble the agent arena
    ///
    /// The runner owns every agent; nothing below it holds a reference back
    /// up, which keeps the ownership graph acyclic.
    pub fn new(settings: Settings, parts: RunnerParts) -> Self {
        let retrieval = &settings.retrieval;
        let pipeline = &settings.pipeline;

        let pool = RequestPool::new(
            retrieval.pool_max_outstanding,
            Duration::from_millis(retrieval.pool_wait_ms),
        );

        let rewriter = Arc::new(QueryRewriter::new(parts.vocabulary.clone()));
        let searcher = Arc::new(HybridSearcher::new(
            parts.embedder.clone(),
            parts.index.clone(),
            pool,
            retrieval.hybrid_alpha,
            retrieval.search_top_k,
        ));
        let reranker = Arc::new(Reranker::new(
            pipeline.k_rerank,
            podwise_config::constants::retrieval::DIVERSITY_PENALTY,
        ));

        let experts = Category::ALL
            .iter()
            .map(|&category| {
                Arc::new(CategoryExpert::new(
                    category,
                    rewriter.clone(),
                    searcher.clone(),
                    reranker.clone(),
                ))
            })
            .collect();

        let leader = Leader::new(
            parts.vocabulary.clone(),
            parts.episodes.clone(),
            parts.recommender.clone(),
            pipeline,
        );

        let augmenter = Arc::new(Augmenter::new(parts.index.clone(), pipeline.augment_tokens));
        let compressor = Arc::new(Compressor::new(
            parts.embedder.clone(),
            pipeline.context_tokens,
            pipeline.min_sentence_similarity,
        ));
        let answerer = Arc::new(Answerer::new(parts.llm.clone()));

        Self {
            experts,
            leader,
            augmenter,
            compressor,
            answerer,
            websearch: parts.websearch,
            settings,
        }
    }

    /// Run one query to completion
    pub async fn run(&self, query: Query) -> Result<RunReport, Error> {
        self.run_with_cancel(query, CancellationToken::new()).await
    }

    /// Run one query under an external cancellation scope
    ///
    /// Cancelling the token (client disconnect) aborts all in-flight
    /// children immediately.
    pub async fn run_with_cancel(
        &self,
        query: Query,
        cancel: CancellationToken,
    ) -> Result<RunReport, Error> {
        counter!("podwise_requests_total").increment(1);
        let trace = Arc::new(Mutex::new(Trace::new(&query.id)));
        let budget = Duration::from_millis(self.settings.server.request_budget_ms);

        let outcome = tokio::select! {
            result = tokio::time::timeout(budget, self.run_inner(&query, &trace)) => {
                match result {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        counter!("podwise_request_budget_expired_total").increment(1);
                        trace.lock().record(
                            TraceEntry::new("request").timed_out().note("overall budget expired"),
                        );
                        InnerOutcome::Fallback(FallbackReason::BudgetExpired)
                    }
                }
            }
            _ = cancel.cancelled() => {
                trace.lock().record(TraceEntry::new("request").note("client disconnected"));
                return Err(Error::Timeout("client disconnected".to_string()));
            }
        };

        let response = match outcome {
            InnerOutcome::Rag(response) => {
                counter!("podwise_responses_total", "source" => "rag").increment(1);
                response
            }
            InnerOutcome::Fallback(reason) => self.degrade(&query, reason, &trace).await?,
        };

        let trace = Arc::try_unwrap(trace)
            .map(|m| m.into_inner())
            .unwrap_or_else(|arc| arc.lock().clone());

        Ok(RunReport { response, trace })
    }

    /// Stages 1-7; every recoverable problem becomes a FallbackReason
    async fn run_inner(
        &self,
        query: &Query,
        trace: &Mutex<Trace>,
    ) -> Result<InnerOutcome, Error> {
        let budgets = self.settings.pipeline.stage_budgets_ms.clone();

        // Stage 1: classify
        let (decision, classify_trace) = self.leader.classify(&query.text);
        trace.lock().record(classify_trace);

        // Stage 2: dispatch experts concurrently inside the request scope
        let mut join_set: JoinSet<Result<ExpertReport, String>> = JoinSet::new();
        for category in decision.dispatch_set() {
            let Some(expert) = self.experts.iter().find(|e| e.category() == category) else {
                continue;
            };
            let expert = expert.clone();
            let text = query.text.clone();
            let lang = Some(query.lang.clone());
            let budgets = budgets.clone();
            let thresholds = self.settings.pipeline.thresholds.clone();
            join_set.spawn(async move {
                expert
                    .run(&text, lang, &budgets, &thresholds)
                    .await
                    .map_err(|e| format!("{}: {}", expert.category(), e))
            });
        }

        let mut reports: Vec<ExpertReport> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(reason)) => {
                    tracing::warn!(%reason, "Expert failed");
                    trace
                        .lock()
                        .record(TraceEntry::new("expert").note(reason));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Expert task aborted");
                }
            }
        }

        if reports.is_empty() {
            return Ok(InnerOutcome::Fallback(FallbackReason::StageFailed(
                "all experts failed".to_string(),
            )));
        }

        // Deterministic merge order regardless of completion order
        reports.sort_by_key(|r| r.category.rank());
        {
            let mut t = trace.lock();
            for report in &reports {
                t.absorb(report.trace.clone());
                t.record(
                    TraceEntry::new(format!("expert:{}", report.category))
                        .sized(1, report.candidates.len())
                        .note(format!("confidence {:.2}", report.expert_confidence)),
                );
            }
        }

        // Stage 3: merge
        let (merged, merge_trace) = self.leader.merge(&reports);
        trace.lock().record(merge_trace);

        if merged.is_empty() {
            return Ok(InnerOutcome::Fallback(FallbackReason::LowConfidence(0.0)));
        }
        let best_hybrid = merged
            .first()
            .map(|c| c.hybrid_score)
            .unwrap_or(0.0);

        let thresholds = &self.settings.pipeline.thresholds;

        // Stage 4: augment, then compress
        let augmented = match run_with_budget(
            self.augmenter.as_ref(),
            merged,
            Duration::from_millis(budgets.augment),
        )
        .await
        {
            Ok(outcome) => {
                trace
                    .lock()
                    .record(threshold_note(&outcome, thresholds.augment));
                outcome.output
            }
            Err(e) => {
                return Ok(InnerOutcome::Fallback(FallbackReason::StageFailed(format!(
                    "augment: {}",
                    e
                ))))
            }
        };

        let compressed = match run_with_budget(
            self.compressor.as_ref(),
            CompressInput {
                candidates: augmented.clone(),
                query: query.text.clone(),
            },
            Duration::from_millis(budgets.compress),
        )
        .await
        {
            Ok(outcome) => {
                trace
                    .lock()
                    .record(threshold_note(&outcome, thresholds.compress));
                outcome.output
            }
            Err(e) => {
                return Ok(InnerOutcome::Fallback(FallbackReason::StageFailed(format!(
                    "compress: {}",
                    e
                ))))
            }
        };

        // Stage 5: answer
        let answer = match run_with_budget(
            self.answerer.as_ref(),
            AnswerInput {
                context: compressed.text.clone(),
                query: query.text.clone(),
            },
            Duration::from_millis(budgets.answer),
        )
        .await
        {
            Ok(outcome) => {
                trace
                    .lock()
                    .record(threshold_note(&outcome, thresholds.answer));
                outcome.output
            }
            Err(e) => {
                tracing::warn!(error = %e, "Answer generation failed");
                return Ok(InnerOutcome::Fallback(FallbackReason::LlmUnavailable));
            }
        };

        // Stage 6: recommendations
        let (recommendations, recommend_trace) = self
            .leader
            .build_recommendations(&augmented, query.user_id.as_deref())
            .await
            .map_err(podwise_core::Error::from)?;
        trace.lock().record(recommend_trace);

        // Stage 7: confidence gate
        match self.leader.gate(best_hybrid, answer.confidence) {
            LeaderVerdict::Rag { confidence } => Ok(InnerOutcome::Rag(Response {
                answer_text: answer.text,
                recommendations,
                confidence,
                source: ResponseSource::Rag,
                trace_id: query.id.clone(),
            })),
            LeaderVerdict::NeedsFallback { leader_confidence } => Ok(InnerOutcome::Fallback(
                FallbackReason::LowConfidence(leader_confidence),
            )),
        }
    }

    /// Fallback path: web search if enabled and convincing, else default
    async fn degrade(
        &self,
        query: &Query,
        reason: FallbackReason,
        trace: &Mutex<Trace>,
    ) -> Result<Response, Error> {
        counter!("podwise_fallbacks_total").increment(1);
        let websearch_config = &self.settings.websearch;

        if !websearch_config.enabled {
            if reason == FallbackReason::LlmUnavailable {
                // Nothing internal works and the outward path is switched off
                return Err(Error::backend("llm", "no backend available, fallback disabled"));
            }
            trace.lock().record(
                TraceEntry::new("fallback").note(format!("disabled, {}", reason.as_note())),
            );
            counter!("podwise_responses_total", "source" => "default").increment(1);
            return Ok(Response::default_response(&query.id));
        }

        let started = std::time::Instant::now();
        let budget = Duration::from_millis(self.settings.pipeline.stage_budgets_ms.websearch);
        let searched = tokio::time::timeout(
            budget,
            self.websearch
                .search(&query.text, websearch_config.max_results, &query.lang),
        )
        .await;

        let mut entry = TraceEntry::new("websearch")
            .elapsed(started.elapsed().as_millis() as u64)
            .note(reason.as_note());

        match searched {
            Ok(result) if result.confidence >= self.leader.fallback_threshold() => {
                entry.output_size = result.results.len();
                trace.lock().record(entry);
                counter!("podwise_responses_total", "source" => "web_fallback").increment(1);
                Ok(Response {
                    answer_text: result.summary,
                    recommendations: Vec::new(),
                    confidence: result.confidence,
                    source: ResponseSource::WebFallback,
                    trace_id: query.id.clone(),
                })
            }
            Ok(result) => {
                entry.output_size = result.results.len();
                entry.note = Some(format!(
                    "{}; fallback confidence {:.2} below bar",
                    reason.as_note(),
                    result.confidence
                ));
                trace.lock().record(entry);
                counter!("podwise_responses_total", "source" => "default").increment(1);
                Ok(Response::default_response(&query.id))
            }
            Err(_) => {
                trace.lock().record(entry.timed_out());
                counter!("podwise_responses_total", "source" => "default").increment(1);
                Ok(Response::default_response(&query.id))
            }
        }
    }
}
