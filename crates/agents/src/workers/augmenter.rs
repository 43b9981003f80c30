//! W3 - context augmenter
//!
//! Widens each candidate with neighbouring chunks from the same episode
//! (adjacent indices), bounded by the per-candidate extra-token budget.

use async_trait::async_trait;
use std::sync::Arc;

use podwise_core::{Candidate, VectorIndex};

use crate::worker::Worker;
use crate::workers::estimate_tokens;
use crate::AgentError;

/// Context augmenter worker
pub struct Augmenter {
    index: Arc<dyn VectorIndex>,
    /// Extra tokens allowed per candidate (A)
    extra_tokens: usize,
}

impl Augmenter {
    pub fn new(index: Arc<dyn VectorIndex>, extra_tokens: usize) -> Self {
        Self {
            index,
            extra_tokens,
        }
    }
}

#[async_trait]
impl Worker for Augmenter {
    type Input = Vec<Candidate>;
    type Output = Vec<Candidate>;

    fn name(&self) -> &'static str {
        "augment"
    }

    async fn execute(&self, input: Vec<Candidate>) -> Result<(Vec<Candidate>, f32), AgentError> {
        let total = input.len();
        let mut augmented_count = 0usize;
        let mut output = Vec::with_capacity(total);

        for mut candidate in input {
            match self
                .index
                .neighbours(&candidate.episode_id, candidate.chunk_index, 1)
                .await
            {
                Ok(neighbours) => {
                    let mut before = String::new();
                    let mut after = String::new();
                    for neighbour in neighbours {
                        if neighbour.chunk_id == candidate.chunk_id {
                            continue;
                        }
                        if neighbour.chunk_index < candidate.chunk_index {
                            before = neighbour.text;
                        } else {
                            after = neighbour.text;
                        }
                    }

                    let mut budget = self.extra_tokens;
                    let mut grew = false;
                    for (text, prepend) in [(before, true), (after, false)] {
                        if text.is_empty() {
                            continue;
                        }
                        let cost = estimate_tokens(&text);
                        if cost > budget {
                            continue;
                        }
                        budget -= cost;
                        if prepend {
                            candidate.text = format!("{} {}", text, candidate.text);
                        } else {
                            candidate.text = format!("{} {}", candidate.text, text);
                        }
                        grew = true;
                    }

                    if grew {
                        augmented_count += 1;
                        candidate.touch("augment");
                    }
                }
                Err(e) => {
                    // Missing context is not worth failing the request over
                    tracing::debug!(
                        chunk = %candidate.chunk_id,
                        error = %e,
                        "Neighbour lookup failed, keeping candidate as-is"
                    );
                }
            }
            output.push(candidate);
        }

        let fraction = if total == 0 {
            0.0
        } else {
            augmented_count as f32 / total as f32
        };
        let confidence = 0.6 + 0.4 * fraction;

        Ok((output, confidence))
    }

    fn on_timeout(&self, input: Vec<Candidate>) -> Vec<Candidate> {
        input
    }

    fn input_size(&self, input: &Vec<Candidate>) -> usize {
        input.len()
    }

    fn output_size(&self, output: &Vec<Candidate>) -> usize {
        output.len()
    }
}
