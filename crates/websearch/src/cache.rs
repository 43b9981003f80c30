//! TTL cache over a search provider
//!
//! Identical (query, lang) pairs within the TTL window are served from
//! memory. Only non-empty responses are cached, so a transient provider
//! outage does not pin an empty result for the whole window.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use podwise_core::{WebSearchProvider, WebSearchResponse};

struct CachedEntry {
    stored_at: Instant,
    response: WebSearchResponse,
}

/// Caching decorator for any provider
pub struct CachingSearchProvider {
    inner: Arc<dyn WebSearchProvider>,
    ttl: Duration,
    entries: DashMap<(String, String), CachedEntry>,
}

impl CachingSearchProvider {
    pub fn new(inner: Arc<dyn WebSearchProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl WebSearchProvider for CachingSearchProvider {
    async fn search(&self, query: &str, max_results: usize, lang: &str) -> WebSearchResponse {
        let key = (query.to_string(), lang.to_string());

        if let Some(entry) = self.entries.get(&key) {
            if entry.stored_at.elapsed() < self.ttl {
                tracing::debug!(query, lang, "Web search cache hit");
                return entry.response.clone();
            }
        }
        self.entries.remove(&key);

        let response = self.inner.search(query, max_results, lang).await;
        if !response.results.is_empty() {
            self.entries.insert(
                key,
                CachedEntry {
                    stored_at: Instant::now(),
                    response: response.clone(),
                },
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podwise_core::WebSearchHit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        empty: bool,
    }

    #[async_trait]
    impl WebSearchProvider for CountingProvider {
        async fn search(&self, _q: &str, _n: usize, _lang: &str) -> WebSearchResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                WebSearchResponse::empty()
            } else {
                WebSearchResponse {
                    results: vec![WebSearchHit {
                        title: "t".into(),
                        url: "u".into(),
                        snippet: "s".into(),
                        confidence: 0.8,
                    }],
                    summary: "s".into(),
                    confidence: 0.8,
                }
            }
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            empty: false,
        });
        let cached = CachingSearchProvider::new(inner.clone(), Duration::from_secs(60));

        cached.search("q", 5, "zh").await;
        cached.search("q", 5, "zh").await;
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        // Different lang is a different key
        cached.search("q", 5, "en").await;
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_responses_not_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            empty: true,
        });
        let cached = CachingSearchProvider::new(inner.clone(), Duration::from_secs(60));

        cached.search("q", 5, "zh").await;
        cached.search("q", 5, "zh").await;
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }
}
