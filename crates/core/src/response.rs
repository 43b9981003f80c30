//! Final response types

use serde::{Deserialize, Serialize};

use crate::Episode;

/// Where the answer came from
///
/// Always distinguishable in the response body so clients can render the
/// appropriate UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Rag,
    WebFallback,
    Default,
}

/// Canonical apology emitted with the default response
pub const DEFAULT_APOLOGY: &str =
    "抱歉，我目前找不到足夠的資訊回答這個問題。請換個方式再問一次。";

/// The answer returned to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub answer_text: String,
    /// 1..=3 episodes, empty only for the default response
    pub recommendations: Vec<Episode>,
    pub confidence: f32,
    pub source: ResponseSource,
    pub trace_id: String,
}

impl Response {
    /// The fixed response used when both retrieval and fallback fail
    pub fn default_response(trace_id: impl Into<String>) -> Self {
        Self {
            answer_text: DEFAULT_APOLOGY.to_string(),
            recommendations: Vec::new(),
            confidence: 0.0,
            source: ResponseSource::Default,
            trace_id: trace_id.into(),
        }
    }
}
