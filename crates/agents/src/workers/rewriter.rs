//! W1 - query rewriter
//!
//! Expands the query with vocabulary synonyms, labels intent from a small
//! closed set, and surfaces the matched entities. Purely CPU-bound; the
//! budget exists for symmetry with the other workers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use podwise_core::Category;
use podwise_tags::{TagMatcher, VocabularyHandle};

use crate::worker::Worker;
use crate::AgentError;

/// Closed intent set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Wants episode suggestions
    Recommend,
    /// Wants to learn a topic
    Learn,
    /// Asks a factual question
    Question,
    /// No clear signal
    Explore,
}

/// W1 output
#[derive(Debug, Clone)]
pub struct RewrittenQuery {
    pub original: String,
    /// Original text followed by the synonym expansions
    pub rewritten: String,
    pub expansions: Vec<String>,
    /// Matched vocabulary surface forms
    pub entities: Vec<String>,
    pub intent: QueryIntent,
    /// Strongest tag category, when any tag matched
    pub inferred_domain: Option<Category>,
    /// Canonical names of matched tags, for downstream tag scoring
    pub matched_tag_names: Vec<String>,
}

/// Query rewriter worker
pub struct QueryRewriter {
    vocabulary: Arc<VocabularyHandle>,
}

impl QueryRewriter {
    pub fn new(vocabulary: Arc<VocabularyHandle>) -> Self {
        Self { vocabulary }
    }

    fn detect_intent(text: &str) -> QueryIntent {
        let lowered = text.to_lowercase();
        const RECOMMEND_CUES: [&str; 6] = ["recommend", "suggest", "推薦", "推荐", "有什麼", "有没有"];
        const LEARN_CUES: [&str; 5] = ["learn", "how to", "學習", "学习", "入門"];
        const QUESTION_CUES: [&str; 6] = ["what", "why", "when", "是什麼", "为什么", "嗎"];

        if RECOMMEND_CUES.iter().any(|c| lowered.contains(c)) {
            QueryIntent::Recommend
        } else if LEARN_CUES.iter().any(|c| lowered.contains(c)) {
            QueryIntent::Learn
        } else if QUESTION_CUES.iter().any(|c| lowered.contains(c)) {
            QueryIntent::Question
        } else {
            QueryIntent::Explore
        }
    }
}

#[async_trait]
impl Worker for QueryRewriter {
    type Input = String;
    type Output = RewrittenQuery;

    fn name(&self) -> &'static str {
        "rewrite"
    }

    async fn execute(&self, input: String) -> Result<(RewrittenQuery, f32), AgentError> {
        let vocabulary = self.vocabulary.current();
        let matcher = TagMatcher::new(vocabulary.clone());
        let matches = matcher.match_text(&input);

        let mut expansions: Vec<String> = Vec::new();
        let mut entities: Vec<String> = Vec::new();
        let mut matched_tag_names: Vec<String> = Vec::new();

        for m in &matches {
            matched_tag_names.push(m.tag_name.clone());
            entities.extend(m.matched_tokens.iter().cloned());

            if let Some(tag) = vocabulary.by_name(&m.tag_name) {
                expansions.push(tag.name.clone());
                expansions.extend(
                    tag.synonyms
                        .iter()
                        .filter(|s| !m.matched_tokens.contains(s))
                        .cloned(),
                );
            }
        }
        expansions.dedup();

        let inferred_domain = matches.first().map(|m| m.category);
        let intent = Self::detect_intent(&input);

        let rewritten = if expansions.is_empty() {
            input.clone()
        } else {
            format!("{} {}", input, expansions.join(" "))
        };

        // Confidence grows with matched vocabulary coverage
        let confidence = (0.5 + 0.2 * matches.len() as f32).min(1.0);

        Ok((
            RewrittenQuery {
                original: input,
                rewritten,
                expansions,
                entities,
                intent,
                inferred_domain,
                matched_tag_names,
            },
            confidence,
        ))
    }

    fn on_timeout(&self, input: String) -> RewrittenQuery {
        RewrittenQuery {
            rewritten: input.clone(),
            original: input,
            expansions: Vec::new(),
            entities: Vec::new(),
            intent: QueryIntent::Explore,
            inferred_domain: None,
            matched_tag_names: Vec::new(),
        }
    }

    fn input_size(&self, input: &String) -> usize {
        input.chars().count()
    }

    fn output_size(&self, output: &RewrittenQuery) -> usize {
        output.rewritten.chars().count()
    }
}
