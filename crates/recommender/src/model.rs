//! User-based kNN scoring
//!
//! Prediction follows the classic mean-centred form: the user's mean rating
//! plus the similarity-weighted deviation of each neighbour's rating from
//! that neighbour's own mean, clamped to the rating scale and mapped to
//! [0,1] for fusion with retrieval ranks.

use std::collections::BTreeMap;

use crate::snapshot::{InteractionSnapshot, RATING_MAX};

/// Scored episode for a user
pub type ScoredEpisode = (String, f32);

/// Immutable kNN model over one snapshot
#[derive(Debug)]
pub struct CfModel {
    snapshot: InteractionSnapshot,
    /// Per-user mean rating, precomputed at build
    user_means: BTreeMap<String, f32>,
    /// Per-user vector norm, precomputed at build
    user_norms: BTreeMap<String, f32>,
    k_cf: usize,
    min_interactions: usize,
}

impl CfModel {
    pub fn new(snapshot: InteractionSnapshot, k_cf: usize, min_interactions: usize) -> Self {
        let mut user_means = BTreeMap::new();
        let mut user_norms = BTreeMap::new();

        for (user, ratings) in snapshot.users() {
            if ratings.is_empty() {
                continue;
            }
            let sum: f32 = ratings.values().sum();
            let norm: f32 = ratings.values().map(|r| r * r).sum::<f32>().sqrt();
            user_means.insert(user.clone(), sum / ratings.len() as f32);
            user_norms.insert(user.clone(), norm);
        }

        Self {
            snapshot,
            user_means,
            user_norms,
            k_cf,
            min_interactions,
        }
    }

    pub fn version(&self) -> &str {
        self.snapshot.version()
    }

    /// Whether kNN is active for this user
    pub fn is_cold(&self, user_id: &str) -> bool {
        self.snapshot.interaction_count(user_id) < self.min_interactions
    }

    /// Rank candidate episodes for a user
    ///
    /// Cold or unknown users fall back to global popularity restricted to the
    /// candidate set. Unknown episodes are filtered out. Never fails.
    pub fn recommend(
        &self,
        user_id: &str,
        candidate_episode_ids: &[String],
        top_k: usize,
    ) -> Vec<ScoredEpisode> {
        let mut seen = std::collections::BTreeSet::new();
        let candidates: Vec<&String> = candidate_episode_ids
            .iter()
            .filter(|id| self.snapshot.knows_episode(id) && seen.insert(id.as_str()))
            .collect();

        let mut scored: Vec<ScoredEpisode> = if self.is_cold(user_id) {
            candidates
                .into_iter()
                .map(|id| (id.clone(), self.snapshot.popularity_score(id)))
                .collect()
        } else {
            let neighbours = self.neighbours_of(user_id);
            candidates
                .into_iter()
                .map(|id| (id.clone(), self.predict(user_id, id, &neighbours)))
                .collect()
        };

        // Stable sort keeps candidate order on ties, so output is deterministic
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Predicted [0,1] score for one (user, episode) pair
    pub fn score(&self, user_id: &str, episode_id: &str) -> f32 {
        if !self.snapshot.knows_episode(episode_id) {
            return 0.0;
        }
        if self.is_cold(user_id) {
            return self.snapshot.popularity_score(episode_id);
        }
        let neighbours = self.neighbours_of(user_id);
        self.predict(user_id, episode_id, &neighbours)
    }

    /// Top-k_cf most similar users, deterministic order
    fn neighbours_of(&self, user_id: &str) -> Vec<(String, f32)> {
        let Some(own) = self.snapshot.ratings_for(user_id) else {
            return Vec::new();
        };
        let own_norm = self.user_norms.get(user_id).copied().unwrap_or(0.0);
        if own_norm <= f32::EPSILON {
            return Vec::new();
        }

        let mut similarities: Vec<(String, f32)> = Vec::new();
        for (other, ratings) in self.snapshot.users() {
            if other == user_id {
                continue;
            }
            let other_norm = self.user_norms.get(other).copied().unwrap_or(0.0);
            if other_norm <= f32::EPSILON {
                continue;
            }

            let dot: f32 = own
                .iter()
                .filter_map(|(episode, r)| ratings.get(episode).map(|o| r * o))
                .sum();
            if dot <= 0.0 {
                continue;
            }

            similarities.push((other.clone(), dot / (own_norm * other_norm)));
        }

        similarities.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        similarities.truncate(self.k_cf);
        similarities
    }

    fn predict(&self, user_id: &str, episode_id: &str, neighbours: &[(String, f32)]) -> f32 {
        let user_mean = self.user_means.get(user_id).copied().unwrap_or(0.0);

        let mut weighted_deviation = 0.0;
        let mut similarity_mass = 0.0;
        for (neighbour, similarity) in neighbours {
            let Some(ratings) = self.snapshot.ratings_for(neighbour) else {
                continue;
            };
            let Some(&rating) = ratings.get(episode_id) else {
                continue;
            };
            let neighbour_mean = self.user_means.get(neighbour).copied().unwrap_or(0.0);
            weighted_deviation += similarity * (rating - neighbour_mean);
            similarity_mass += similarity.abs();
        }

        let predicted = if similarity_mass > f32::EPSILON {
            user_mean + weighted_deviation / similarity_mass
        } else {
            // No neighbour rated it; the user's own mean is the best estimate
            user_mean
        };

        predicted.clamp(0.0, RATING_MAX) / RATING_MAX
    }
}
