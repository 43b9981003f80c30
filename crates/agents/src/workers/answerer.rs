//! W6 - answerer
//!
//! Single LLM pool call with a fixed system prompt that confines the model
//! to the provided context. The only worker allowed to touch the LLM.

use async_trait::async_trait;
use std::sync::Arc;

use podwise_llm::{LlmPool, Message};

use crate::worker::Worker;
use crate::AgentError;

/// System prompt shared by every answer generation
const ANSWER_SYSTEM_PROMPT: &str = "You are a podcast knowledge assistant. Answer the user's \
question using ONLY the provided transcript context. If the context does not contain the answer, \
say you do not know. Do not invent facts, names, or numbers that are not in the context. Answer \
in the user's language.";

/// W6 input
#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub context: String,
    pub query: String,
}

/// W6 output
#[derive(Debug, Clone)]
pub struct AnswerDraft {
    pub text: String,
    pub model_used: String,
    pub confidence: f32,
}

impl AnswerDraft {
    fn empty() -> Self {
        Self {
            text: String::new(),
            model_used: String::new(),
            confidence: 0.0,
        }
    }
}

/// Answer generation worker
pub struct Answerer {
    pool: Arc<LlmPool>,
}

impl Answerer {
    pub fn new(pool: Arc<LlmPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Worker for Answerer {
    type Input = AnswerInput;
    type Output = AnswerDraft;

    fn name(&self) -> &'static str {
        "answer"
    }

    async fn execute(&self, input: AnswerInput) -> Result<(AnswerDraft, f32), AgentError> {
        let messages = [
            Message::system(ANSWER_SYSTEM_PROMPT),
            Message::user(format!(
                "Context:\n{}\n\nQuestion: {}",
                input.context, input.query
            )),
        ];

        let answer = self.pool.generate(&messages).await?;
        let confidence = answer.confidence;

        tracing::debug!(
            model = %answer.model_used,
            tokens = answer.tokens_used,
            elapsed_ms = answer.elapsed_ms,
            confidence,
            "Answer generated"
        );

        Ok((
            AnswerDraft {
                text: answer.text,
                model_used: answer.model_used,
                confidence,
            },
            confidence,
        ))
    }

    fn on_timeout(&self, _input: AnswerInput) -> AnswerDraft {
        AnswerDraft::empty()
    }

    fn input_size(&self, input: &AnswerInput) -> usize {
        input.context.chars().count()
    }

    fn output_size(&self, output: &AnswerDraft) -> usize {
        output.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::run_with_budget;
    use podwise_llm::{GenerationResult, LlmBackend, LlmError};
    use std::time::Duration;

    struct EchoBackend;

    #[async_trait]
    impl LlmBackend for EchoBackend {
        async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
            // The system prompt must always be present and first
            assert_eq!(messages.len(), 2);
            assert!(messages[0].content.contains("ONLY the provided transcript context"));
            Ok(GenerationResult {
                text: "a grounded answer drawn from context".into(),
                tokens: 8,
                total_time_ms: 3,
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "echo"
        }

        fn backend_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_answer_flows_through_pool() {
        let pool = Arc::new(LlmPool::from_backends(
            vec![Box::new(EchoBackend)],
            Duration::from_secs(1),
            4,
        ));
        let answerer = Answerer::new(pool);

        let outcome = run_with_budget(
            &answerer,
            AnswerInput {
                context: "transcript context".into(),
                query: "question".into(),
            },
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(outcome.output.model_used, "echo");
        assert!(outcome.confidence > 0.0);
    }

    #[tokio::test]
    async fn test_pool_unavailable_surfaces_error() {
        let pool = Arc::new(LlmPool::from_backends(
            Vec::new(),
            Duration::from_secs(1),
            4,
        ));
        let answerer = Answerer::new(pool);

        let result = run_with_budget(
            &answerer,
            AnswerInput {
                context: "ctx".into(),
                query: "q".into(),
            },
            Duration::from_secs(1),
        )
        .await;

        assert!(result.is_err());
    }
}
