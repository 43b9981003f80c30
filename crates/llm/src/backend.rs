//! LLM backend implementations
//!
//! Two backend shapes cover the deployment targets: Ollama's native chat API
//! for local models, and the OpenAI chat-completions shape for everything
//! hosted. Retries with exponential backoff happen here, at the boundary;
//! layers above fall back instead of retrying.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use podwise_config::{LlmBackendConfig, LlmProviderKind};

use crate::prompt::{Message, Role};
use crate::LlmError;

/// Configuration for one backend in the pool
#[derive(Debug, Clone)]
pub struct SingleBackendConfig {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl SingleBackendConfig {
    pub fn from_settings(config: &LlmBackendConfig, timeout: Duration) -> Self {
        Self {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model_id.clone(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub tokens: usize,
    pub total_time_ms: u64,
}

/// LLM backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Check whether the backend answers at all
    async fn is_available(&self) -> bool;

    /// Model identifier for traces and responses
    fn model_name(&self) -> &str;

    /// Backend name as configured in the pool
    fn backend_name(&self) -> &str;
}

/// Shared retry loop for transient failures
async fn with_retries<F, Fut>(
    config: &SingleBackendConfig,
    mut attempt_fn: F,
) -> Result<GenerationResult, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<GenerationResult, LlmError>>,
{
    let mut backoff = config.initial_backoff;
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
            tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
            backoff *= 2;
            tracing::warn!(
                backend = %config.name,
                attempt,
                max = config.max_retries,
                "LLM request retry"
            );
        }

        match attempt_fn().await {
            Ok(result) => return Ok(result),
            Err(e) if is_retryable(&e) => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(LlmError::Unavailable))
}

fn is_retryable(error: &LlmError) -> bool {
    matches!(error, LlmError::Network(_) | LlmError::Timeout)
}

// =============================================================================
// Ollama backend
// =============================================================================

/// Ollama chat backend
pub struct OllamaBackend {
    client: Client,
    config: SingleBackendConfig,
}

impl OllamaBackend {
    pub fn new(config: SingleBackendConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn execute(&self, request: &OllamaChatRequest) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();
        let url = format!(
            "{}/api/chat",
            self.config.endpoint.trim_end_matches('/')
        );

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(LlmError::Network(format!("HTTP {}: {}", status, body)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(GenerationResult {
            text: parsed.message.content,
            tokens: parsed.eval_count.unwrap_or(0) as usize,
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(|m| m.into()).collect(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                num_predict: Some(self.config.max_tokens as i32),
            }),
        };

        with_retries(&self.config, || self.execute(&request)).await
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint.trim_end_matches('/'));
        self.client
            .get(&url)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn backend_name(&self) -> &str {
        &self.config.name
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: WireMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}

// =============================================================================
// OpenAI-compatible backend
// =============================================================================

/// OpenAI-compatible chat backend
///
/// Works with OpenAI, vLLM, and local servers exposing the
/// chat-completions shape.
pub struct OpenAiBackend {
    client: Client,
    config: SingleBackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: SingleBackendConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() && !config.endpoint.starts_with("http://localhost") {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    async fn execute(&self, request: &OpenAiChatRequest) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();

        let mut builder = self.client.post(self.chat_url()).json(request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(LlmError::Network(format!("HTTP {}: {}", status, body)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        Ok(GenerationResult {
            text: choice.message.content,
            tokens: parsed
                .usage
                .map(|u| u.completion_tokens)
                .unwrap_or_default(),
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let request = OpenAiChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        Role::System => "system".to_string(),
                        Role::User => "user".to_string(),
                        Role::Assistant => "assistant".to_string(),
                    },
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        };

        with_retries(&self.config, || self.execute(&request)).await
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.get(&url).timeout(Duration::from_secs(5));
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn backend_name(&self) -> &str {
        &self.config.name
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    completion_tokens: usize,
}

/// Build a backend from pool settings
pub fn build_backend(
    config: &LlmBackendConfig,
    timeout: Duration,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    let single = SingleBackendConfig::from_settings(config, timeout);
    match config.provider {
        LlmProviderKind::Ollama => Ok(Box::new(OllamaBackend::new(single)?)),
        LlmProviderKind::OpenAi => Ok(Box::new(OpenAiBackend::new(single)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, api_key: Option<&str>) -> SingleBackendConfig {
        SingleBackendConfig {
            name: "test".into(),
            endpoint: endpoint.into(),
            model: "m".into(),
            api_key: api_key.map(|s| s.to_string()),
            max_tokens: 64,
            temperature: 0.3,
            timeout: Duration::from_secs(5),
            max_retries: 1,
            initial_backoff: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_openai_requires_key_for_remote() {
        assert!(OpenAiBackend::new(config("https://api.openai.com/v1", None)).is_err());
        assert!(OpenAiBackend::new(config("http://localhost:8000/v1", None)).is_ok());
        assert!(OpenAiBackend::new(config("https://api.openai.com/v1", Some("sk"))).is_ok());
    }

    #[test]
    fn test_chat_url_shape() {
        let backend = OpenAiBackend::new(config("http://localhost:8000/v1/", None)).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn test_message_conversion() {
        let wire: WireMessage = (&Message::user("hello")).into();
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content, "hello");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&LlmError::Timeout));
        assert!(is_retryable(&LlmError::Network("reset".into())));
        assert!(!is_retryable(&LlmError::Api("400".into())));
    }
}
