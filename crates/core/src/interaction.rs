//! User interaction rows
//!
//! Batch-dumped by the user store at refresh time; input to the collaborative
//! recommender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the user did with an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Like,
    Unlike,
    Play,
    Skip,
}

impl InteractionAction {
    /// Base rating contribution on the [0,5] scale
    pub fn weight(&self) -> f32 {
        match self {
            InteractionAction::Like => 5.0,
            InteractionAction::Play => 3.0,
            InteractionAction::Skip => -1.0,
            InteractionAction::Unlike => -5.0,
        }
    }

    /// Positive actions raise the derived rating; negatives lower it
    pub fn is_positive(&self) -> bool {
        matches!(self, InteractionAction::Like | InteractionAction::Play)
    }
}

/// One interaction event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRow {
    pub user_id: String,
    pub episode_id: String,
    pub action: InteractionAction,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_polarity() {
        assert!(InteractionAction::Like.is_positive());
        assert!(InteractionAction::Play.is_positive());
        assert!(!InteractionAction::Skip.is_positive());
        assert!(InteractionAction::Like.weight() > InteractionAction::Play.weight());
    }
}
