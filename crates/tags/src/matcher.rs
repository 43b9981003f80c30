//! Sparse tag matching
//!
//! Scores tag hits against a query: an exact canonical-name hit contributes
//! 1.0, a synonym hit 0.8, and each tag keeps the max of the two. Ties are
//! broken by tag name so identical queries always produce identical output.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use podwise_core::Category;

use crate::vocabulary::Vocabulary;

const CANONICAL_SCORE: f32 = 1.0;
const SYNONYM_SCORE: f32 = 0.8;

/// One matched tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagMatch {
    pub tag_name: String,
    pub category: Category,
    pub score: f32,
    pub matched_tokens: Vec<String>,
}

/// Matcher over a vocabulary snapshot
pub struct TagMatcher {
    vocabulary: Arc<Vocabulary>,
}

impl TagMatcher {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Match tags against free text
    ///
    /// Never fails for normal input; no token hit yields an empty list.
    pub fn match_text(&self, text: &str) -> Vec<TagMatch> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        let tokens = tokenize(&normalized);

        // tag index -> (score, matched tokens)
        let mut hits: HashMap<usize, (f32, BTreeSet<String>)> = HashMap::new();

        // Single-token lookups against both indexes
        for token in &tokens {
            if let Some(&idx) = self.vocabulary.name_index().get(token.as_str()) {
                record_hit(&mut hits, idx, CANONICAL_SCORE, token);
            }
            if let Some(&idx) = self.vocabulary.synonym_index().get(token.as_str()) {
                record_hit(&mut hits, idx, SYNONYM_SCORE, token);
            }
        }

        // Phrase and CJK surface forms match by containment on the
        // normalized text; CJK synonyms rarely align with token boundaries.
        for (key, &idx) in self.vocabulary.name_index() {
            if is_phrase(key) && normalized.contains(key.as_str()) {
                record_hit(&mut hits, idx, CANONICAL_SCORE, key);
            }
        }
        for (key, &idx) in self.vocabulary.synonym_index() {
            if is_phrase(key) && normalized.contains(key.as_str()) {
                record_hit(&mut hits, idx, SYNONYM_SCORE, key);
            }
        }

        let mut matches: Vec<TagMatch> = hits
            .into_iter()
            .map(|(idx, (score, tokens))| {
                let tag = self.vocabulary.tag(idx);
                TagMatch {
                    tag_name: tag.name.clone(),
                    category: tag.category,
                    score,
                    matched_tokens: tokens.into_iter().collect(),
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.tag_name.cmp(&b.tag_name))
        });
        matches
    }

    /// Per-category aggregate of match scores, used by leader classification
    pub fn category_signal(&self, text: &str) -> HashMap<Category, f32> {
        let mut signal: HashMap<Category, f32> = HashMap::new();
        for m in self.match_text(text) {
            *signal.entry(m.category).or_insert(0.0) += m.score;
        }
        signal
    }
}

/// Keep the best score per tag and accumulate the tokens that hit it
fn record_hit(
    hits: &mut HashMap<usize, (f32, BTreeSet<String>)>,
    idx: usize,
    score: f32,
    token: &str,
) {
    let entry = hits.entry(idx).or_insert((0.0, BTreeSet::new()));
    if score > entry.0 {
        entry.0 = score;
    }
    entry.1.insert(token.to_string());
}

/// Jaccard overlap between two tag-name sets, in [0,1]
///
/// `tag_overlap(x, x) == 1` for non-empty x; any empty side yields 0.
pub fn tag_overlap(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: BTreeSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let set_b: BTreeSet<&str> = b.iter().map(|s| s.as_str()).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

/// Lowercase and strip punctuation, collapsing runs of whitespace
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() || is_cjk(c) {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Words plus CJK bigrams, so two-character Chinese terms match tokens
fn tokenize(normalized: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for word in normalized.unicode_words() {
        tokens.push(word.to_string());

        let chars: Vec<char> = word.chars().collect();
        if chars.iter().all(|&c| is_cjk(c)) && chars.len() > 1 {
            for window in chars.windows(2) {
                tokens.push(window.iter().collect());
            }
        }
    }
    tokens
}

fn is_phrase(key: &str) -> bool {
    key.contains(' ') || key.chars().any(is_cjk)
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c) || ('\u{3400}'..='\u{4DBF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(
            Vocabulary::from_yaml(
                r#"
tags:
  - name: investing
    category: business
    synonyms: ["投資", "理財", "stock market"]
  - name: english
    category: education
    synonyms: ["英文", "商業英文"]
  - name: entrepreneurship
    category: business
    synonyms: ["創業"]
"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_canonical_beats_synonym() {
        let matcher = TagMatcher::new(vocab());
        let matches = matcher.match_text("investing in the stock market");
        assert_eq!(matches[0].tag_name, "investing");
        // Canonical hit wins over the 0.8 synonym hit on the same tag
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn test_cjk_synonym_match() {
        let matcher = TagMatcher::new(vocab());
        let matches = matcher.match_text("我想學習投資理財");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tag_name, "investing");
        assert_eq!(matches[0].score, 0.8);
        assert!(matches[0].matched_tokens.contains(&"投資".to_string()));
    }

    #[test]
    fn test_multi_category_query() {
        let matcher = TagMatcher::new(vocab());
        let signal = matcher.category_signal("學習商業英文和投資");
        assert!(signal[&Category::Education] > 0.0);
        assert!(signal[&Category::Business] > 0.0);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let matcher = TagMatcher::new(vocab());
        assert!(matcher.match_text("quantum chromodynamics").is_empty());
        assert!(matcher.match_text("").is_empty());
        assert!(matcher.match_text("!!! ???").is_empty());
    }

    #[test]
    fn test_deterministic_tie_break() {
        let matcher = TagMatcher::new(vocab());
        // Both tags hit via synonyms at 0.8; alphabetical order decides
        let matches = matcher.match_text("創業 英文");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].tag_name, "english");
        assert_eq!(matches[1].tag_name, "entrepreneurship");
    }

    #[test]
    fn test_overlap_properties() {
        let x = vec!["a".to_string(), "b".to_string()];
        assert_eq!(tag_overlap(&x, &x), 1.0);
        assert_eq!(tag_overlap(&x, &[]), 0.0);
        assert_eq!(tag_overlap(&[], &[]), 0.0);

        let y = vec!["b".to_string(), "c".to_string()];
        let jaccard = tag_overlap(&x, &y);
        assert!((jaccard - 1.0 / 3.0).abs() < 1e-6);
    }
}
