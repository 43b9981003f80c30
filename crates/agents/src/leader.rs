//! Leader / orchestrator
//!
//! The leader owns the decisions around the worker pipeline: query
//! classification, merging expert candidate sets, shaping the episode
//! recommendations, and the final confidence gate that picks RAG versus
//! fallback versus default.

use std::collections::HashMap;
use std::sync::Arc;

use podwise_config::{GateConfig, PipelineConfig};
use podwise_core::{
    Candidate, Category, CategoryDecision, Episode, EpisodeStore, TraceEntry,
};
use podwise_recommender::RecommenderHandle;
use podwise_tags::{TagMatcher, VocabularyHandle};

use crate::expert::ExpertReport;
use crate::AgentError;

/// Lexical cue weight added on top of tag-match signal
const CUE_WEIGHT: f32 = 0.5;

const BUSINESS_CUES: [&str; 6] = ["invest", "startup", "市場", "股票", "創業", "理財"];
const EDUCATION_CUES: [&str; 6] = ["learn", "study", "course", "學習", "教學", "課程"];

/// Ceiling on episode ids derived from candidates
const MAX_DERIVED_EPISODES: usize = 6;

/// Final recommendation count bounds
const MIN_RECOMMENDATIONS: usize = 1;
const MAX_RECOMMENDATIONS: usize = 3;

/// Outcome of the confidence gate
#[derive(Debug, Clone, PartialEq)]
pub enum LeaderVerdict {
    /// Internal evidence suffices
    Rag { confidence: f32 },
    /// Confidence below the bar; try the web fallback
    NeedsFallback { leader_confidence: f32 },
}

/// Leader agent
pub struct Leader {
    vocabulary: Arc<VocabularyHandle>,
    episodes: Arc<dyn EpisodeStore>,
    recommender: Arc<RecommenderHandle>,
    gate: GateConfig,
    k_merge: usize,
}

impl Leader {
    pub fn new(
        vocabulary: Arc<VocabularyHandle>,
        episodes: Arc<dyn EpisodeStore>,
        recommender: Arc<RecommenderHandle>,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            vocabulary,
            episodes,
            recommender,
            gate: pipeline.gate.clone(),
            k_merge: pipeline.k_merge,
        }
    }

    /// Stage 1 - classify the query into a category decision
    ///
    /// Tag-match signal plus lexical cues, normalized per category. A query
    /// with no signal at all lands in `Other`.
    pub fn classify(&self, text: &str) -> (CategoryDecision, TraceEntry) {
        let started = std::time::Instant::now();
        let matcher = TagMatcher::new(self.vocabulary.current());
        let mut signal = matcher.category_signal(text);

        let lowered = text.to_lowercase();
        for cue in BUSINESS_CUES {
            if lowered.contains(cue) {
                *signal.entry(Category::Business).or_insert(0.0) += CUE_WEIGHT;
            }
        }
        for cue in EDUCATION_CUES {
            if lowered.contains(cue) {
                *signal.entry(Category::Education).or_insert(0.0) += CUE_WEIGHT;
            }
        }

        let total: f32 = signal.values().sum();
        let decision = if total <= f32::EPSILON {
            CategoryDecision {
                primary: Category::Other,
                secondaries: Vec::new(),
                is_multi: false,
            }
        } else {
            let mut ranked: Vec<(Category, f32)> = signal
                .into_iter()
                .map(|(category, score)| (category, score / total))
                .collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.rank().cmp(&b.0.rank()))
            });

            let (primary, primary_confidence) = ranked[0];
            let secondaries: Vec<(Category, f32)> = ranked.into_iter().skip(1).collect();
            let is_multi = secondaries.first().is_some_and(|(_, confidence)| {
                *confidence >= podwise_config::constants::gate::MULTI_SECONDARY_MIN
                    && *confidence
                        >= podwise_config::constants::gate::MULTI_SECONDARY_RATIO
                            * primary_confidence
            });

            CategoryDecision {
                primary,
                secondaries,
                is_multi,
            }
        };

        let trace = TraceEntry::new("classify")
            .sized(text.chars().count(), decision.dispatch_set().len())
            .elapsed(started.elapsed().as_millis() as u64)
            .note(format!(
                "primary={} multi={}",
                decision.primary, decision.is_multi
            ));

        (decision, trace)
    }

    /// Stage 3 - merge expert reports into one ranked candidate set
    ///
    /// Dedup by chunk id, rank by `expert_confidence * hybrid_score`, keep
    /// K_merge. Order is fully deterministic: rank score desc, then category
    /// rank, then chunk id.
    pub fn merge(&self, reports: &[ExpertReport]) -> (Vec<Candidate>, TraceEntry) {
        let started = std::time::Instant::now();
        let input_size: usize = reports.iter().map(|r| r.candidates.len()).sum();

        // chunk_id -> (rank score, category rank, candidate)
        let mut best: HashMap<String, (f32, u8, Candidate)> = HashMap::new();
        for report in reports {
            for candidate in &report.candidates {
                let rank_score = report.expert_confidence * candidate.hybrid_score;
                let keep = best
                    .get(&candidate.chunk_id)
                    .map_or(true, |(existing, _, _)| rank_score > *existing);
                if keep {
                    best.insert(
                        candidate.chunk_id.clone(),
                        (rank_score, report.category.rank(), candidate.clone()),
                    );
                }
            }
        }

        let mut ranked: Vec<(f32, u8, Candidate)> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.chunk_id.cmp(&b.2.chunk_id))
        });

        let dropped: Vec<String> = ranked
            .iter()
            .skip(self.k_merge)
            .map(|(_, _, c)| c.chunk_id.clone())
            .collect();

        let merged: Vec<Candidate> = ranked
            .into_iter()
            .take(self.k_merge)
            .map(|(_, _, mut c)| {
                c.touch("merge");
                c
            })
            .collect();

        let mut trace = TraceEntry::new("merge")
            .sized(input_size, merged.len())
            .elapsed(started.elapsed().as_millis() as u64);
        trace.dropped = dropped;

        (merged, trace)
    }

    /// Stage 6 - derive and rank the episode recommendations
    ///
    /// Up to six episode ids come out of the candidates in order; with a
    /// known user the order is re-blended with collaborative-filtering
    /// scores. Returns 1..=3 episodes, or none when there were no
    /// candidates at all.
    pub async fn build_recommendations(
        &self,
        candidates: &[Candidate],
        user_id: Option<&str>,
    ) -> Result<(Vec<Episode>, TraceEntry), AgentError> {
        let started = std::time::Instant::now();

        // Dedup by episode, preserving candidate order
        let mut episode_ids: Vec<String> = Vec::new();
        for candidate in candidates {
            if !episode_ids.contains(&candidate.episode_id) {
                episode_ids.push(candidate.episode_id.clone());
            }
            if episode_ids.len() == MAX_DERIVED_EPISODES {
                break;
            }
        }

        if episode_ids.is_empty() {
            let trace = TraceEntry::new("recommend")
                .sized(candidates.len(), 0)
                .elapsed(started.elapsed().as_millis() as u64)
                .note("no candidates");
            return Ok((Vec::new(), trace));
        }

        let n = episode_ids.len() as f32;
        let mut scored: Vec<(String, f32)> = episode_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), (n - i as f32) / n))
            .collect();

        if let Some(user) = user_id {
            let model = self.recommender.current();
            for (episode_id, score) in scored.iter_mut() {
                let cf = model.score(user, episode_id);
                *score = 0.5 * *score + 0.5 * cf;
            }
            // Stable sort keeps retrieval order on CF ties
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        }

        let strong = scored
            .iter()
            .filter(|(_, score)| {
                *score >= podwise_config::constants::gate::RECOMMEND_SCORE_MIN
            })
            .count();
        let count = strong.clamp(MIN_RECOMMENDATIONS, MAX_RECOMMENDATIONS);
        scored.truncate(count);

        let wanted: Vec<String> = scored.iter().map(|(id, _)| id.clone()).collect();
        let fetched = self.episodes.get_episodes_by_ids(&wanted).await?;

        // Reassemble in score order; the store may return any order
        let by_id: HashMap<String, Episode> = fetched
            .into_iter()
            .map(|e| (e.episode_id.clone(), e))
            .collect();
        let mut recommendations: Vec<Episode> = Vec::with_capacity(wanted.len());
        let mut seen: Vec<String> = Vec::new();
        for id in &wanted {
            if seen.contains(id) {
                // Should be impossible after the dedup above
                tracing::error!(episode_id = %id, "Duplicate episode in final list, dropping");
                continue;
            }
            if let Some(episode) = by_id.get(id) {
                seen.push(id.clone());
                recommendations.push(episode.clone());
            }
        }

        let trace = TraceEntry::new("recommend")
            .sized(candidates.len(), recommendations.len())
            .elapsed(started.elapsed().as_millis() as u64)
            .note(format!(
                "derived={} strong={} user={}",
                episode_ids.len(),
                strong,
                user_id.unwrap_or("-")
            ));

        Ok((recommendations, trace))
    }

    /// Stage 7 - confidence gate
    ///
    /// `leader_confidence = w1 * best_hybrid + w2 * answer_confidence`
    pub fn gate(&self, best_hybrid: f32, answer_confidence: f32) -> LeaderVerdict {
        let leader_confidence = (self.gate.w_best_hybrid * best_hybrid
            + self.gate.w_answer * answer_confidence)
            .clamp(0.0, 1.0);

        if leader_confidence >= self.gate.confidence_threshold_rag {
            LeaderVerdict::Rag {
                confidence: leader_confidence,
            }
        } else {
            LeaderVerdict::NeedsFallback { leader_confidence }
        }
    }

    /// Fallback acceptance bar for the web-search summary
    pub fn fallback_threshold(&self) -> f32 {
        self.gate.confidence_threshold_fallback
    }
}
