//! Collaborative filtering recommender
//!
//! Features:
//! - Interaction snapshot with action weights and age decay
//! - User-based kNN over cosine similarity of rating vectors
//! - Popularity ranking for cold users
//! - Atomic snapshot refresh; readers never take a lock
//!
//! The recommender never fails for unknown users or episodes: unknown users
//! are treated as cold, unknown episodes are filtered out.

pub mod model;
pub mod snapshot;

pub use model::CfModel;
pub use snapshot::InteractionSnapshot;

use arc_swap::ArcSwap;
use std::sync::Arc;

use thiserror::Error;

/// Recommender errors (snapshot loading only; scoring never fails)
#[derive(Error, Debug)]
pub enum CfError {
    #[error("Failed to read snapshot: {0}")]
    Io(String),

    #[error("Malformed snapshot row {line}: {message}")]
    Malformed { line: usize, message: String },
}

impl From<CfError> for podwise_core::Error {
    fn from(err: CfError) -> Self {
        podwise_core::Error::backend("recommender", err.to_string())
    }
}

/// Atomic-swap handle over the active model
///
/// The refresh job builds a new `CfModel` off to the side and swaps it in;
/// in-flight requests keep scoring against the snapshot they started with.
pub struct RecommenderHandle {
    inner: ArcSwap<CfModel>,
}

impl RecommenderHandle {
    pub fn new(model: CfModel) -> Self {
        Self {
            inner: ArcSwap::from_pointee(model),
        }
    }

    pub fn current(&self) -> Arc<CfModel> {
        self.inner.load_full()
    }

    /// Atomic replacement of the matrix and precomputed similarity inputs
    pub fn refresh(&self, snapshot: InteractionSnapshot, k_cf: usize, min_interactions: usize) {
        let version = snapshot.version().to_string();
        let model = CfModel::new(snapshot, k_cf, min_interactions);
        self.inner.store(Arc::new(model));
        tracing::info!(version = %version, "Interaction snapshot swapped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use podwise_core::{InteractionAction, InteractionRow};

    #[test]
    fn test_refresh_swaps_version() {
        let now = Utc::now();
        let rows = vec![InteractionRow {
            user_id: "u1".into(),
            episode_id: "e1".into(),
            action: InteractionAction::Like,
            timestamp: now,
        }];
        let snapshot = InteractionSnapshot::from_rows(rows, 30.0, now);
        let handle = RecommenderHandle::new(CfModel::new(snapshot, 10, 5));
        let v1 = handle.current().version().to_string();

        let fresh = InteractionSnapshot::from_rows(Vec::new(), 30.0, now);
        handle.refresh(fresh, 10, 5);
        assert_ne!(handle.current().version(), v1);
    }
}
