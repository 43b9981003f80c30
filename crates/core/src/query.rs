//! Per-request query types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Category;

/// An incoming user question
///
/// Created at the gateway, immutable afterwards. Lives for exactly one
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Trace id assigned by the gateway
    pub id: String,
    /// Raw question text
    pub text: String,
    /// Opaque user identifier, when the caller is known
    pub user_id: Option<String>,
    /// Session identifier, when provided
    pub session_id: Option<String>,
    /// Arrival time
    pub received_at: DateTime<Utc>,
    /// BCP-47 language tag; defaults to "zh"
    pub lang: String,
}

impl Query {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            user_id: None,
            session_id: None,
            received_at: Utc::now(),
            lang: "zh".to_string(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }
}

/// Output of leader classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDecision {
    /// Best-scoring category
    pub primary: Category,
    /// Remaining categories with their confidence, strongest first
    pub secondaries: Vec<(Category, f32)>,
    /// True when a secondary clears the multi-dispatch bar
    pub is_multi: bool,
}

/// Secondary confidence floor for dispatching an extra expert
const SECONDARY_DISPATCH_MIN: f32 = 0.4;

impl CategoryDecision {
    /// Categories to dispatch experts for, primary first
    ///
    /// Secondaries ride along only when the decision is multi-category and
    /// they clear the dispatch floor on their own.
    pub fn dispatch_set(&self) -> Vec<Category> {
        let mut set = vec![self.primary];
        if self.is_multi {
            for (category, confidence) in &self.secondaries {
                if *confidence >= SECONDARY_DISPATCH_MIN && !set.contains(category) {
                    set.push(*category);
                }
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_set_single() {
        let decision = CategoryDecision {
            primary: Category::Business,
            secondaries: vec![(Category::Education, 0.2)],
            is_multi: false,
        };
        assert_eq!(decision.dispatch_set(), vec![Category::Business]);
    }

    #[test]
    fn test_dispatch_set_multi() {
        let decision = CategoryDecision {
            primary: Category::Business,
            secondaries: vec![(Category::Education, 0.5)],
            is_multi: true,
        };
        assert_eq!(
            decision.dispatch_set(),
            vec![Category::Business, Category::Education]
        );
    }
}
