//! Priority-ordered backend pool
//!
//! Backends are tried in priority order until one returns within the
//! configured timeout and passes the minimum-length sanity check. Each
//! backend carries its own in-flight semaphore so one saturated model does
//! not starve the rest. Safe for concurrent callers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use podwise_config::LlmPoolConfig;

use crate::backend::{build_backend, LlmBackend};
use crate::prompt::Message;
use crate::LlmError;

/// Refusal prefixes that zero out the confidence heuristic
const REFUSAL_PATTERNS: [&str; 4] = ["i cannot", "i can't", "抱歉，我無法", "我无法"];

/// Completed generation with pool metadata
#[derive(Debug, Clone)]
pub struct PoolAnswer {
    pub text: String,
    pub model_used: String,
    pub tokens_used: usize,
    pub elapsed_ms: u64,
    /// Heuristic in [0,1]
    pub confidence: f32,
}

struct PoolMember {
    backend: Box<dyn LlmBackend>,
    inflight: Arc<Semaphore>,
    priority: u32,
}

/// Priority pool over LLM backends
pub struct LlmPool {
    members: Vec<PoolMember>,
    request_timeout: Duration,
    min_answer_chars: usize,
}

impl LlmPool {
    /// Build from settings; backends are sorted by priority at construction
    pub fn from_settings(config: &LlmPoolConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let mut members = Vec::with_capacity(config.backends.len());

        for backend_config in &config.backends {
            members.push(PoolMember {
                backend: build_backend(backend_config, timeout)?,
                inflight: Arc::new(Semaphore::new(backend_config.max_inflight)),
                priority: backend_config.priority,
            });
        }
        members.sort_by_key(|m| m.priority);

        Ok(Self {
            members,
            request_timeout: timeout,
            min_answer_chars: config.min_answer_chars,
        })
    }

    /// Pool for tests with pre-built backends
    pub fn from_backends(
        backends: Vec<Box<dyn LlmBackend>>,
        request_timeout: Duration,
        min_answer_chars: usize,
    ) -> Self {
        let members = backends
            .into_iter()
            .enumerate()
            .map(|(priority, backend)| PoolMember {
                backend,
                inflight: Arc::new(Semaphore::new(4)),
                priority: priority as u32,
            })
            .collect();
        Self {
            members,
            request_timeout,
            min_answer_chars,
        }
    }

    /// Generate with fallback through the priority order
    pub async fn generate(&self, messages: &[Message]) -> Result<PoolAnswer, LlmError> {
        for member in &self.members {
            let _permit = match member.inflight.acquire().await {
                Ok(permit) => permit,
                Err(_) => continue,
            };

            let attempt =
                tokio::time::timeout(self.request_timeout, member.backend.generate(messages)).await;

            match attempt {
                Ok(Ok(result)) => {
                    if result.text.trim().chars().count() < self.min_answer_chars {
                        tracing::warn!(
                            backend = member.backend.backend_name(),
                            chars = result.text.trim().chars().count(),
                            "Generation below sanity length, trying next backend"
                        );
                        continue;
                    }
                    let confidence = self.confidence_of(&result.text);
                    return Ok(PoolAnswer {
                        text: result.text,
                        model_used: member.backend.model_name().to_string(),
                        tokens_used: result.tokens,
                        elapsed_ms: result.total_time_ms,
                        confidence,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        backend = member.backend.backend_name(),
                        error = %e,
                        "Backend failed, trying next"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        backend = member.backend.backend_name(),
                        timeout_ms = self.request_timeout.as_millis() as u64,
                        "Backend timed out, trying next"
                    );
                }
            }
        }

        Err(LlmError::Unavailable)
    }

    /// Heuristic confidence: non-empty, non-refusal, length-scaled
    fn confidence_of(&self, text: &str) -> f32 {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return 0.0;
        }

        let lowered = trimmed.to_lowercase();
        if REFUSAL_PATTERNS.iter().any(|p| lowered.starts_with(p)) {
            return 0.1;
        }

        // Length component saturates at ~4x the sanity floor
        let chars = trimmed.chars().count() as f32;
        let floor = self.min_answer_chars.max(1) as f32;
        let length_component = (chars / (4.0 * floor)).min(1.0);

        (0.6 + 0.4 * length_component).min(1.0)
    }

    /// True when at least one backend answers its availability probe
    pub async fn any_available(&self) -> bool {
        for member in &self.members {
            if member.backend.is_available().await {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
