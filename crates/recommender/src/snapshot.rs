//! Interaction snapshot
//!
//! Built from the user store's batch dump of `(user, episode, action, ts)`
//! rows. Ratings live on a [0,5] scale: each action contributes its weight
//! decayed by age with the configured half-life, and the per-pair sum is
//! clamped so ratings stay monotone in the number of positive actions.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use podwise_core::InteractionRow;

use crate::CfError;

/// Rating ceiling on the interaction scale
pub const RATING_MAX: f32 = 5.0;

/// Read-only user-episode rating matrix
#[derive(Debug, Clone, Default)]
pub struct InteractionSnapshot {
    /// user -> (episode -> rating in [0,5]); BTreeMaps keep iteration stable
    ratings: BTreeMap<String, BTreeMap<String, f32>>,
    /// episode -> summed positive rating mass across users
    popularity: BTreeMap<String, f32>,
    /// Highest popularity mass, for [0,1] scaling
    max_popularity: f32,
    /// Version tag carried into traces
    version: String,
}

impl InteractionSnapshot {
    /// Build from dump rows
    ///
    /// `now` is passed in rather than read from the clock so rebuilds are
    /// reproducible in tests.
    pub fn from_rows(rows: Vec<InteractionRow>, half_life_days: f32, now: DateTime<Utc>) -> Self {
        let mut accumulated: BTreeMap<String, BTreeMap<String, f32>> = BTreeMap::new();
        let mut latest: Option<DateTime<Utc>> = None;
        let count = rows.len();

        for row in rows {
            let age_days = (now - row.timestamp).num_seconds().max(0) as f32 / 86_400.0;
            let decay = 0.5_f32.powf(age_days / half_life_days.max(f32::EPSILON));
            let contribution = row.action.weight() * decay;

            *accumulated
                .entry(row.user_id)
                .or_default()
                .entry(row.episode_id)
                .or_insert(0.0) += contribution;

            latest = Some(latest.map_or(row.timestamp, |t| t.max(row.timestamp)));
        }

        let mut ratings: BTreeMap<String, BTreeMap<String, f32>> = BTreeMap::new();
        let mut popularity: BTreeMap<String, f32> = BTreeMap::new();

        for (user, episodes) in accumulated {
            let mut clamped: BTreeMap<String, f32> = BTreeMap::new();
            for (episode, raw) in episodes {
                let rating = raw.clamp(0.0, RATING_MAX);
                if rating > 0.0 {
                    *popularity.entry(episode.clone()).or_insert(0.0) += rating;
                }
                clamped.insert(episode, rating);
            }
            ratings.insert(user, clamped);
        }

        let max_popularity = popularity.values().cloned().fold(0.0_f32, f32::max);
        let version = format!(
            "{}-{}",
            count,
            latest.map(|t| t.timestamp()).unwrap_or_default()
        );

        Self {
            ratings,
            popularity,
            max_popularity,
            version,
        }
    }

    /// Load from a JSON-lines dump file
    pub fn load(
        path: impl AsRef<Path>,
        half_life_days: f32,
        now: DateTime<Utc>,
    ) -> Result<Self, CfError> {
        let file = std::fs::File::open(path.as_ref())
            .map_err(|e| CfError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        let reader = std::io::BufReader::new(file);

        let mut rows = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| CfError::Io(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: InteractionRow =
                serde_json::from_str(&line).map_err(|e| CfError::Malformed {
                    line: line_no + 1,
                    message: e.to_string(),
                })?;
            rows.push(row);
        }

        Ok(Self::from_rows(rows, half_life_days, now))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn user_count(&self) -> usize {
        self.ratings.len()
    }

    pub fn ratings_for(&self, user_id: &str) -> Option<&BTreeMap<String, f32>> {
        self.ratings.get(user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, f32>)> {
        self.ratings.iter()
    }

    pub fn interaction_count(&self, user_id: &str) -> usize {
        self.ratings.get(user_id).map(|r| r.len()).unwrap_or(0)
    }

    /// Popularity mass scaled into [0,1]
    pub fn popularity_score(&self, episode_id: &str) -> f32 {
        if self.max_popularity <= f32::EPSILON {
            return 0.0;
        }
        self.popularity.get(episode_id).copied().unwrap_or(0.0) / self.max_popularity
    }

    pub fn knows_episode(&self, episode_id: &str) -> bool {
        self.popularity.contains_key(episode_id)
    }
}
