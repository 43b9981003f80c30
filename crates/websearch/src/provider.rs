//! HTTP search provider
//!
//! Targets the SearxNG JSON API shape. Any transport or parse failure
//! degrades to `WebSearchResponse::empty()` after a warn log.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use podwise_config::WebSearchConfig;
use podwise_core::{WebSearchHit, WebSearchProvider, WebSearchResponse};

/// Provider configuration
#[derive(Debug, Clone)]
pub struct SearchProviderConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl From<&WebSearchConfig> for SearchProviderConfig {
    fn from(config: &WebSearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxHit>,
}

#[derive(Debug, Deserialize)]
struct SearxHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

/// SearxNG-compatible provider
pub struct HttpSearchProvider {
    client: Client,
    config: SearchProviderConfig,
}

impl HttpSearchProvider {
    pub fn new(config: SearchProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
        lang: &str,
    ) -> Result<WebSearchResponse, String> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", query), ("format", "json"), ("language", lang)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let parsed: SearxResponse = response.json().await.map_err(|e| e.to_string())?;

        let results: Vec<WebSearchHit> = parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|hit| {
                let confidence = hit
                    .score
                    .map(|s| s.clamp(0.0, 1.0))
                    .unwrap_or_else(|| snippet_confidence(&hit.content));
                WebSearchHit {
                    title: hit.title,
                    url: hit.url,
                    snippet: hit.content,
                    confidence,
                }
            })
            .collect();

        let summary = summarize(&results);
        let confidence = overall_confidence(&results, max_results);

        Ok(WebSearchResponse {
            results,
            summary,
            confidence,
        })
    }

    /// Probe for the health registry
    pub async fn is_available(&self) -> bool {
        self.client
            .get(&self.config.endpoint)
            .query(&[("q", "ping"), ("format", "json")])
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Transport retries before degrading to the empty response
const MAX_ATTEMPTS: u32 = 3;

#[async_trait]
impl WebSearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str, max_results: usize, lang: &str) -> WebSearchResponse {
        let mut backoff = Duration::from_millis(100);
        let mut last_reason = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            match self.fetch(query, max_results, lang).await {
                Ok(response) => return response,
                Err(reason) => last_reason = reason,
            }
        }

        tracing::warn!(reason = %last_reason, "Web search provider failed, returning empty result");
        WebSearchResponse::empty()
    }
}

/// Join the strongest snippets into a short extractive summary
fn summarize(results: &[WebSearchHit]) -> String {
    results
        .iter()
        .take(3)
        .map(|h| h.snippet.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn snippet_confidence(snippet: &str) -> f32 {
    // Longer snippets tend to be substantive; saturate at ~200 chars
    (snippet.chars().count() as f32 / 200.0).clamp(0.0, 1.0)
}

fn overall_confidence(results: &[WebSearchHit], max_results: usize) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let fill = results.len() as f32 / max_results.max(1) as f32;
    let mean_hit: f32 = results.iter().map(|h| h.confidence).sum::<f32>() / results.len() as f32;
    (0.5 * fill + 0.5 * mean_hit).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(snippet: &str, confidence: f32) -> WebSearchHit {
        WebSearchHit {
            title: "t".into(),
            url: "u".into(),
            snippet: snippet.into(),
            confidence,
        }
    }

    #[test]
    fn test_summary_joins_top_snippets() {
        let hits = vec![hit("first.", 0.9), hit("second.", 0.8), hit("", 0.1), hit("fourth.", 0.7)];
        assert_eq!(summarize(&hits), "first. second.");
    }

    #[test]
    fn test_empty_results_zero_confidence() {
        assert_eq!(overall_confidence(&[], 5), 0.0);
    }

    #[test]
    fn test_full_result_set_high_confidence() {
        let hits: Vec<WebSearchHit> = (0..5).map(|_| hit("a substantive snippet", 0.9)).collect();
        assert!(overall_confidence(&hits, 5) > 0.8);
    }

    #[tokio::test]
    async fn test_unreachable_provider_returns_empty() {
        let provider = HttpSearchProvider::new(SearchProviderConfig {
            endpoint: "http://127.0.0.1:1/search".to_string(),
            timeout: Duration::from_millis(100),
        });
        let response = provider.search("anything", 5, "zh").await;
        assert_eq!(response.confidence, 0.0);
        assert!(response.results.is_empty());
    }
}
