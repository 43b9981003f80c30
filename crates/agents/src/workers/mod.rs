//! The six pipeline workers

pub mod answerer;
pub mod augmenter;
pub mod compressor;
pub mod reranker;
pub mod rewriter;
pub mod searcher;

/// Rough token estimate: CJK-heavy text runs ~1.5 chars per token, everything
/// else ~4 chars per token.
pub(crate) fn estimate_tokens(text: &str) -> usize {
    let total = text.chars().count();
    if total == 0 {
        return 0;
    }
    let cjk = text
        .chars()
        .filter(|&c| ('\u{4E00}'..='\u{9FFF}').contains(&c))
        .count();
    if cjk * 3 > total {
        (total as f32 / 1.5).ceil() as usize
    } else {
        total.div_ceil(4)
    }
}

/// Sentence splitting tolerant of CJK punctuation
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '；' | ';') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
